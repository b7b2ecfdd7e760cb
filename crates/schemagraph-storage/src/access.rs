//! Ownership checks on project writes.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::types::{ActorId, Owner, Project, ProjectId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("actor '{actor}' may not modify project {project}")]
pub struct AccessDenied {
    pub actor: ActorId,
    pub project: ProjectId,
}

/// Decides whether an actor may write to a project.
pub trait AccessGuard: Send + Sync {
    fn authorize(&self, actor: &ActorId, project: &Project) -> Result<(), AccessDenied>;
}

/// Lets every actor write. For single-user tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessGuard for AllowAll {
    fn authorize(&self, _actor: &ActorId, _project: &Project) -> Result<(), AccessDenied> {
        Ok(())
    }
}

/// Lets the owning user, or members of the owning team, write.
#[derive(Debug, Clone, Default)]
pub struct OwnerGuard {
    teams: HashMap<String, HashSet<ActorId>>,
}

impl OwnerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, team: impl Into<String>, actor: impl Into<ActorId>) -> Self {
        self.teams
            .entry(team.into())
            .or_default()
            .insert(actor.into());
        self
    }
}

impl AccessGuard for OwnerGuard {
    fn authorize(&self, actor: &ActorId, project: &Project) -> Result<(), AccessDenied> {
        let allowed = match &project.owner {
            Owner::User(user) => &actor.0 == user,
            Owner::Team(team) => self
                .teams
                .get(team)
                .is_some_and(|members| members.contains(actor)),
        };
        if allowed {
            Ok(())
        } else {
            Err(AccessDenied {
                actor: actor.clone(),
                project: project.id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use schemagraph_core::{DiagramGraph, EngineKind};

    fn project(owner: Owner) -> Project {
        Project {
            id: ProjectId(7),
            name: "shop".into(),
            engine_kind: EngineKind::Postgresql,
            content: DiagramGraph::default(),
            version: 0,
            owner,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_owner_only() {
        let guard = OwnerGuard::new();
        let p = project(Owner::User("alice".into()));
        assert!(guard.authorize(&"alice".into(), &p).is_ok());
        assert_eq!(
            guard.authorize(&"bob".into(), &p),
            Err(AccessDenied {
                actor: "bob".into(),
                project: ProjectId(7)
            })
        );
    }

    #[test]
    fn test_team_members() {
        let guard = OwnerGuard::new().with_member("data", "carol");
        let p = project(Owner::Team("data".into()));
        assert!(guard.authorize(&"carol".into(), &p).is_ok());
        assert!(guard.authorize(&"dave".into(), &p).is_err());
    }
}
