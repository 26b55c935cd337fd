//! # Spectate Command
//!
//! `spectate [name]`: start watching an entity by name, or list who can be
//! watched. Replies use the configured [`Messages`].

use thiserror::Error;
use vantage_core::{
    EntityDirectory, Messages, RelocationTicket, SpectateError, SpectationContext,
    SpectationRegistry,
};
use vantage_shared::EntityId;

/// Who issued a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandSender {
    /// The server console.
    Console,
    /// An entity in the simulation.
    Entity(EntityId),
}

/// Successful command result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Spectation started, camera attaches once the ticket completes.
    Started {
        /// Watched entity.
        subject: EntityId,
        /// Pending relocation.
        ticket: RelocationTicket,
    },
    /// No name given: names that can be watched right now.
    Candidates(Vec<String>),
}

/// Why a command failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Issued by something that has no body to move.
    #[error("only entities can spectate")]
    NotAnEntity,

    /// No active entity carries the name.
    #[error("no entity named {0:?}")]
    NotOnline(String),

    /// The named entity may not be watched by this sender.
    #[error("cannot spectate {0:?}")]
    InvalidTarget(String),

    /// The registry or the View Session refused.
    #[error(transparent)]
    Spectate(#[from] SpectateError),
}

impl CommandError {
    /// Prefixed reply for the sender.
    #[must_use]
    pub fn reply(&self, messages: &Messages) -> String {
        match self {
            Self::NotAnEntity => messages.prefixed(&messages.no_player),
            Self::NotOnline(_) => messages.prefixed(&messages.player_not_online),
            Self::InvalidTarget(_) => messages.prefixed(&messages.invalid_target),
            Self::Spectate(err) => messages.prefixed(&err.to_string()),
        }
    }
}

/// Runs `spectate` with `args` on behalf of `sender`.
///
/// # Errors
///
/// See [`CommandError`].
pub fn spectate(
    sender: CommandSender,
    args: &[&str],
    registry: &mut SpectationRegistry,
    ctx: &mut SpectationContext<'_>,
) -> Result<CommandOutcome, CommandError> {
    let CommandSender::Entity(spectator) = sender else {
        return Err(CommandError::NotAnEntity);
    };

    let Some(name) = args.first() else {
        let mut names = registry.spectatable_names(&*ctx.entities);
        names.sort();
        return Ok(CommandOutcome::Candidates(names));
    };

    let subject = ctx
        .entities
        .find_by_name(name)
        .ok_or_else(|| CommandError::NotOnline((*name).to_string()))?;

    match registry.start_spectating(subject, spectator, ctx) {
        Ok(ticket) => Ok(CommandOutcome::Started { subject, ticket }),
        Err(SpectateError::InvalidTarget { .. }) => {
            Err(CommandError::InvalidTarget((*name).to_string()))
        }
        Err(SpectateError::UnknownEntity(_)) => Err(CommandError::NotOnline((*name).to_string())),
        Err(err) => Err(err.into()),
    }
}

/// Tab completion: watchable names starting with `partial`, ignoring case.
#[must_use]
pub fn complete(
    partial: &str,
    registry: &SpectationRegistry,
    entities: &dyn EntityDirectory,
) -> Vec<String> {
    let prefix = partial.to_lowercase();
    let mut names: Vec<String> = registry
        .spectatable_names(entities)
        .into_iter()
        .filter(|name| name.to_lowercase().starts_with(&prefix))
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_core::{CameraRig, EntityMode, EntityTable, RecordingViewSession, VoxelGrid};
    use vantage_shared::{RegionId, Vec3};

    struct Setup {
        entities: EntityTable,
        world: VoxelGrid,
        session: RecordingViewSession,
        registry: SpectationRegistry,
    }

    impl Setup {
        fn new(names: &[&str]) -> (Self, Vec<EntityId>) {
            let mut entities = EntityTable::new();
            let mut registry = SpectationRegistry::new(CameraRig::default());
            let ids = names
                .iter()
                .map(|name| {
                    let id = entities.spawn(name, RegionId(0), Vec3::ZERO);
                    registry.get_or_create(id);
                    id
                })
                .collect();
            let setup = Self {
                entities,
                world: VoxelGrid::new(),
                session: RecordingViewSession::new(),
                registry,
            };
            (setup, ids)
        }

        fn run(&mut self, sender: CommandSender, args: &[&str]) -> Result<CommandOutcome, CommandError> {
            let mut ctx = SpectationContext::new(&mut self.entities, &self.world, &mut self.session);
            spectate(sender, args, &mut self.registry, &mut ctx)
        }
    }

    #[test]
    fn test_console_cannot_spectate() {
        let (mut setup, _) = Setup::new(&["alice"]);
        let err = setup.run(CommandSender::Console, &["alice"]).unwrap_err();
        assert_eq!(err, CommandError::NotAnEntity);
        assert_eq!(
            err.reply(&Messages::default()),
            "Spectator » You have to be a player to do that!"
        );
    }

    #[test]
    fn test_spectate_by_name() {
        let (mut setup, ids) = Setup::new(&["alice", "bob"]);
        let outcome = setup.run(CommandSender::Entity(ids[1]), &["alice"]).unwrap();
        assert!(matches!(outcome, CommandOutcome::Started { subject, .. } if subject == ids[0]));
        assert_eq!(setup.registry.subject_of(ids[1]), Some(ids[0]));
    }

    #[test]
    fn test_unknown_and_invalid_names() {
        let (mut setup, ids) = Setup::new(&["alice", "bob"]);
        assert_eq!(
            setup.run(CommandSender::Entity(ids[1]), &["zed"]),
            Err(CommandError::NotOnline("zed".to_string()))
        );
        assert_eq!(
            setup.run(CommandSender::Entity(ids[1]), &["bob"]),
            Err(CommandError::InvalidTarget("bob".to_string()))
        );
        setup.entities.set_mode(ids[0], EntityMode::Observing);
        let err = setup
            .run(CommandSender::Entity(ids[1]), &["alice"])
            .unwrap_err();
        assert_eq!(
            err.reply(&Messages::default()),
            "Spectator » You can't spectate this player!"
        );
    }

    #[test]
    fn test_no_argument_lists_candidates() {
        let (mut setup, ids) = Setup::new(&["carol", "alice", "bob"]);
        setup.entities.set_mode(ids[2], EntityMode::Observing);
        assert_eq!(
            setup.run(CommandSender::Entity(ids[0]), &[]),
            Ok(CommandOutcome::Candidates(vec![
                "alice".to_string(),
                "carol".to_string()
            ]))
        );
    }

    #[test]
    fn test_completion_is_case_insensitive() {
        let (setup, _) = Setup::new(&["Alice", "albert", "bob"]);
        let names = complete("AL", &setup.registry, &setup.entities);
        assert_eq!(names, vec!["Alice".to_string(), "albert".to_string()]);
        assert!(complete("x", &setup.registry, &setup.entities).is_empty());
    }
}
