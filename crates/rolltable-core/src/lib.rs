pub mod dice;
pub mod error;
pub mod net;
pub mod player;
pub mod roll;
pub mod room;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::dice::DiceRoller;
    use crate::player::{Player, PlayerId};

    /// Create `n` test players named Player1..PlayerN with sequential ids.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player::new(i as PlayerId + 1, format!("Player{}", i + 1)))
            .collect()
    }

    /// A roller that returns a fixed sequence of die faces, cycling when
    /// exhausted. Lets tests pin down exact roll outcomes.
    pub struct ScriptedRoller {
        faces: Vec<i32>,
        next: std::cell::Cell<usize>,
    }

    impl ScriptedRoller {
        pub fn new(faces: Vec<i32>) -> Self {
            Self {
                faces,
                next: std::cell::Cell::new(0),
            }
        }
    }

    impl DiceRoller for ScriptedRoller {
        fn roll(&self, _sides: i32) -> i32 {
            let i = self.next.get();
            self.next.set(i + 1);
            self.faces[i % self.faces.len()]
        }
    }
}
