//! Channel key generation for the `generate_key` command.
//!
//! A key is a 7-digit decimal string.  Candidates are drawn from a
//! [`KeySource`] and checked against the live channel names until an unused
//! one turns up or the attempt budget runs out.

use rand::Rng;

/// Number of candidates tried before giving up.
pub const KEY_ATTEMPTS: usize = 20;

/// Smallest key value (inclusive).
pub const KEY_MIN: u32 = 1_000_000;

/// Largest key value (exclusive).
pub const KEY_MAX: u32 = 10_000_000;

/// Produces candidate channel keys.
///
/// The server uses [`RandomKeySource`]; tests substitute a scripted source to
/// force collisions.
#[cfg_attr(test, mockall::automock)]
pub trait KeySource: Send {
    /// Returns the next candidate key.
    fn candidate(&mut self) -> String;
}

/// Uniformly random 7-digit keys from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomKeySource;

impl KeySource for RandomKeySource {
    fn candidate(&mut self) -> String {
        rand::thread_rng().gen_range(KEY_MIN..KEY_MAX).to_string()
    }
}

/// Draws up to [`KEY_ATTEMPTS`] candidates and returns the first one for
/// which `is_taken` is false.
///
/// Returns `None` if every candidate collided with a live channel.
pub fn generate_key<F>(source: &mut dyn KeySource, is_taken: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    (0..KEY_ATTEMPTS)
        .map(|_| source.candidate())
        .find(|candidate| !is_taken(candidate))
}
