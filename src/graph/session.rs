//! Scoped execution context for graph evaluation
//!
//! A [`Session`] owns the scratch memory the engine works in. It is opened
//! at the start of a training run and released when it goes out of scope,
//! so every exit path of the run (including error returns) gives the
//! memory back without an explicit close pairing.

use crate::{Error, Result};

/// Options controlling how a session acquires memory.
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    /// Grow the scratch arena on demand instead of pre-reserving all of it.
    pub allow_growth: bool,
    /// Arena capacity in `f32` elements when growth is disabled, and the
    /// initial reservation when it is enabled.
    pub reserve: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            allow_growth: true,
            reserve: 1 << 16,
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_growth(mut self, allow: bool) -> Self {
        self.allow_growth = allow;
        self
    }

    pub fn reserve(mut self, elements: usize) -> Self {
        self.reserve = elements;
        self
    }
}

/// An open execution context.
///
/// Dropping a session releases its arena; [`Session::close`] makes the
/// release explicit on the happy path.
pub struct Session {
    arena: Vec<f32>,
    allow_growth: bool,
    high_water: usize,
}

impl Session {
    /// Acquire a session. Fails if the requested reservation cannot be made.
    pub fn open(options: SessionOptions) -> Result<Self> {
        let mut arena = Vec::new();
        arena
            .try_reserve_exact(options.reserve)
            .map_err(|e| Error::Session(format!("failed to reserve arena: {e}")))?;
        Ok(Self {
            arena,
            allow_growth: options.allow_growth,
            high_water: 0,
        })
    }

    /// Borrow a zeroed scratch slice of `len` elements.
    ///
    /// With growth disabled, requests beyond the reserved capacity are a
    /// session error rather than a silent reallocation.
    pub fn scratch(&mut self, len: usize) -> Result<&mut [f32]> {
        if !self.allow_growth && len > self.arena.capacity() {
            return Err(Error::Session(format!(
                "scratch request of {len} elements exceeds reserved capacity {}",
                self.arena.capacity()
            )));
        }
        self.arena.clear();
        self.arena.resize(len, 0.0);
        self.high_water = self.high_water.max(len);
        Ok(&mut self.arena[..])
    }

    /// Largest scratch request served so far.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Release the session. Equivalent to dropping it.
    pub fn close(self) {}
}
