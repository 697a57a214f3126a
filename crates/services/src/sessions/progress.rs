use std::fmt;

/// How far a learner is through the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

impl SessionProgress {
    /// One-based number of the question on screen, capped at `total`.
    #[must_use]
    pub fn current_number(&self) -> usize {
        (self.answered + 1).min(self.total)
    }
}

impl fmt::Display for SessionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.current_number(), self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_one_based_position() {
        let p = SessionProgress {
            total: 10,
            answered: 2,
            remaining: 8,
            is_complete: false,
        };
        assert_eq!(p.to_string(), "3/10");

        let done = SessionProgress {
            total: 3,
            answered: 3,
            remaining: 0,
            is_complete: true,
        };
        assert_eq!(done.current_number(), 3);
    }
}
