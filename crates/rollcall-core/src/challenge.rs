//! Liveness challenges and randomized challenge batches.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Action the subject is asked to perform.
///
/// `Smile` and `Nod` are recognised but never generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeAction {
    Blink,
    TurnLeft,
    TurnRight,
    Smile,
    Nod,
}

/// Actions drawn by [`random_challenges`].
pub const GENERATED_ACTIONS: [ChallengeAction; 3] = [
    ChallengeAction::Blink,
    ChallengeAction::TurnLeft,
    ChallengeAction::TurnRight,
];

impl ChallengeAction {
    pub fn instruction(self) -> &'static str {
        match self {
            ChallengeAction::Blink => "Please blink your eyes",
            ChallengeAction::TurnLeft => "Please turn your head to the left",
            ChallengeAction::TurnRight => "Please turn your head to the right",
            ChallengeAction::Smile => "Please smile",
            ChallengeAction::Nod => "Please nod your head",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivenessChallenge {
    pub action: ChallengeAction,
    pub instruction: String,
    pub completed: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub completed_time: Option<DateTime<Utc>>,
}

impl LivenessChallenge {
    pub fn new(action: ChallengeAction, now: DateTime<Utc>) -> Self {
        Self {
            action,
            instruction: action.instruction().to_string(),
            completed: false,
            start_time: Some(now),
            completed_time: None,
        }
    }

    pub(crate) fn complete(&mut self, now: DateTime<Utc>) {
        self.completed = true;
        self.completed_time = Some(now);
    }
}

/// Draw `count` challenges uniformly from [`GENERATED_ACTIONS`].
///
/// At least one challenge is always a blink: a batch of only head turns can
/// be satisfied by a handful of still photos. If none was drawn, the first
/// slot is replaced by a blink.
pub fn random_challenges<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    now: DateTime<Utc>,
) -> Vec<LivenessChallenge> {
    let mut challenges: Vec<LivenessChallenge> = (0..count)
        .map(|_| {
            let action = *GENERATED_ACTIONS
                .choose(&mut *rng)
                .unwrap_or(&ChallengeAction::Blink);
            LivenessChallenge::new(action, now)
        })
        .collect();

    let has_blink = challenges
        .iter()
        .any(|c| c.action == ChallengeAction::Blink);
    if let (false, Some(first)) = (has_blink, challenges.first_mut()) {
        *first = LivenessChallenge::new(ChallengeAction::Blink, now);
    }

    challenges
}

/// Strategy for building the challenge batch of a new attempt.
pub trait ChallengeSource: Send {
    fn challenges(&mut self, count: usize, now: DateTime<Utc>) -> Vec<LivenessChallenge>;
}

/// [`ChallengeSource`] backed by a random number generator.
pub struct RandomChallenges<R> {
    rng: R,
}

impl<R: Rng + Send> RandomChallenges<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomChallenges<rand::rngs::StdRng> {
    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        use rand::SeedableRng;
        Self::new(rand::rngs::StdRng::from_entropy())
    }
}

impl<R: Rng + Send> ChallengeSource for RandomChallenges<R> {
    fn challenges(&mut self, count: usize, now: DateTime<Utc>) -> Vec<LivenessChallenge> {
        random_challenges(&mut self.rng, count, now)
    }
}

/// Replays a fixed action list on every attempt.
#[derive(Debug, Clone)]
pub struct FixedChallenges {
    actions: Vec<ChallengeAction>,
}

impl FixedChallenges {
    pub fn new(actions: Vec<ChallengeAction>) -> Self {
        Self { actions }
    }
}

impl ChallengeSource for FixedChallenges {
    fn challenges(&mut self, count: usize, now: DateTime<Utc>) -> Vec<LivenessChallenge> {
        self.actions
            .iter()
            .take(count)
            .map(|&action| LivenessChallenge::new(action, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    #[test]
    fn test_always_contains_blink_1000_seeds() {
        for seed in 0..1000u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let batch = random_challenges(&mut rng, 3, now());
            assert_eq!(batch.len(), 3);
            assert!(
                batch.iter().any(|c| c.action == ChallengeAction::Blink),
                "seed {seed} produced no blink"
            );
        }
    }

    #[test]
    fn test_only_generated_actions() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            for c in random_challenges(&mut rng, 5, now()) {
                assert!(GENERATED_ACTIONS.contains(&c.action));
            }
        }
    }

    #[test]
    fn test_challenges_start_incomplete() {
        let mut rng = StdRng::seed_from_u64(1);
        for c in random_challenges(&mut rng, 3, now()) {
            assert!(!c.completed);
            assert_eq!(c.start_time, Some(now()));
            assert_eq!(c.completed_time, None);
            assert_eq!(c.instruction, c.action.instruction());
        }
    }

    #[test]
    fn test_zero_count_is_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(random_challenges(&mut rng, 0, now()).is_empty());
    }

    #[test]
    fn test_same_seed_same_batch() {
        let a = RandomChallenges::new(StdRng::seed_from_u64(42)).challenges(3, now());
        let b = RandomChallenges::new(StdRng::seed_from_u64(42)).challenges(3, now());
        assert_eq!(a, b);
    }

    #[test]
    fn test_fixed_source() {
        let mut src = FixedChallenges::new(vec![ChallengeAction::TurnLeft, ChallengeAction::Blink]);
        let batch = src.challenges(3, now());
        let actions: Vec<_> = batch.iter().map(|c| c.action).collect();
        assert_eq!(actions, vec![ChallengeAction::TurnLeft, ChallengeAction::Blink]);
    }

    #[test]
    fn test_action_serializes_screaming_case() {
        let json = serde_json::to_string(&ChallengeAction::TurnLeft).unwrap();
        assert_eq!(json, "\"TURN_LEFT\"");
    }

    proptest! {
        #[test]
        fn pt_batch_has_blink(seed in any::<u64>(), count in 1_usize..10) {
            let mut rng = StdRng::seed_from_u64(seed);
            let batch = random_challenges(&mut rng, count, now());
            prop_assert_eq!(batch.len(), count);
            prop_assert!(batch.iter().any(|c| c.action == ChallengeAction::Blink));
        }
    }
}
