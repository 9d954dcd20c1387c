//! Dice helpers over any `Rng`

use rand::Rng;

pub fn roll_d6<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    rng.gen_range(1..=6)
}

pub fn roll_2d6<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    roll_d6(rng) + roll_d6(rng)
}
