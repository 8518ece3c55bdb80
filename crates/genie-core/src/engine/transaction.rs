/// A committed value and a working copy that is either promoted or reset.
#[derive(Debug, Clone, PartialEq)]
pub struct Staged<T: Clone> {
    current: T,
    proposed: T,
}

impl<T: Clone> Staged<T> {
    pub fn new(value: T) -> Self {
        Self {
            proposed: value.clone(),
            current: value,
        }
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn proposed(&self) -> &T {
        &self.proposed
    }

    pub fn proposed_mut(&mut self) -> &mut T {
        &mut self.proposed
    }

    /// Replaces the committed value with the working copy.
    pub fn commit(&mut self) {
        self.current = self.proposed.clone();
    }

    /// Resets the working copy to the committed value.
    pub fn discard(&mut self) {
        self.proposed = self.current.clone();
    }

    /// Runs `action` on the working copy, discarding its changes if it fails.
    pub fn transaction<F, R, E>(&mut self, action: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
    {
        let result = action(&mut self.proposed);
        if result.is_err() {
            self.discard();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_promotes_proposed_value() {
        let mut staged = Staged::new(vec![1, 2]);
        staged.proposed_mut().push(3);
        assert_eq!(staged.current(), &vec![1, 2]);
        staged.commit();
        assert_eq!(staged.current(), &vec![1, 2, 3]);
        assert_eq!(staged.proposed(), &vec![1, 2, 3]);
    }

    #[test]
    fn discard_restores_committed_value() {
        let mut staged = Staged::new(String::from("ACGT"));
        staged.proposed_mut().push('A');
        staged.discard();
        assert_eq!(staged.proposed(), "ACGT");
        assert_eq!(staged.current(), "ACGT");
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let mut staged = Staged::new(10);
        let result: Result<(), &str> = staged.transaction(|v| {
            *v += 5;
            Err("oracle down")
        });
        assert!(result.is_err());
        assert_eq!(*staged.proposed(), 10);

        let ok: Result<i32, &str> = staged.transaction(|v| {
            *v += 1;
            Ok(*v)
        });
        assert_eq!(ok, Ok(11));
        assert_eq!(*staged.current(), 10);
    }
}
