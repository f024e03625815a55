//! In-memory team roster: testers, points, warnings and admins.
//!
//! This is the business backend the tools operate on. It lives for the
//! process lifetime only.

use foreman::role::Role;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::config::BotConfig;
use crate::error::{RosterError, RosterResult};

/// Warnings after which a tester is deactivated.
pub const MAX_WARNINGS: u32 = 3;

/// Largest absolute amount a single award may carry.
pub const MAX_AWARD: i64 = 1000;

/// One team member tracked by the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tester {
    /// Platform user id.
    pub id: i64,
    /// Username without `@`.
    pub username: String,
    /// Display name.
    pub full_name: String,
    /// Accumulated points.
    pub total_points: i64,
    /// Accepted bug reports.
    pub total_bugs: u32,
    /// Played test games.
    pub total_games: u32,
    /// Active warnings.
    pub warnings_count: u32,
    /// Whether the tester is still active.
    pub is_active: bool,
}

impl Tester {
    /// Create a tester with no history.
    pub fn new(id: i64, username: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            full_name: full_name.into(),
            total_points: 0,
            total_bugs: 0,
            total_games: 0,
            warnings_count: 0,
            is_active: true,
        }
    }
}

/// A task draft created on behalf of a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDraft {
    /// Draft id.
    pub id: Uuid,
    /// Short title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Caller who requested the task.
    pub created_by: i64,
}

#[derive(Debug, Default)]
struct RosterState {
    owner_id: i64,
    admins: BTreeSet<i64>,
    testers: BTreeMap<i64, Tester>,
    tasks: Vec<TaskDraft>,
}

impl RosterState {
    fn find_mut(&mut self, username: &str) -> RosterResult<&mut Tester> {
        let wanted = clean_username(username);
        self.testers
            .values_mut()
            .find(|t| t.username.eq_ignore_ascii_case(&wanted))
            .ok_or(RosterError::TesterNotFound(wanted))
    }
}

fn clean_username(username: &str) -> String {
    username.trim().trim_start_matches('@').to_string()
}

/// Shared, lock-protected roster.
#[derive(Debug, Default)]
pub struct Roster {
    state: RwLock<RosterState>,
}

impl Roster {
    /// Create an empty roster owned by `owner_id`.
    #[must_use]
    pub fn new(owner_id: i64) -> Self {
        Self {
            state: RwLock::new(RosterState {
                owner_id,
                ..RosterState::default()
            }),
        }
    }

    /// Seed a roster from the configuration.
    #[must_use]
    pub fn from_config(config: &BotConfig) -> Self {
        let mut state = RosterState {
            owner_id: config.owner_id,
            admins: config.admins.iter().copied().collect(),
            ..RosterState::default()
        };
        for seed in &config.testers {
            state.testers.insert(
                seed.id,
                Tester::new(seed.id, seed.username.clone(), seed.full_name.clone()),
            );
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Add or replace a tester.
    pub async fn add_tester(&self, tester: Tester) {
        self.state.write().await.testers.insert(tester.id, tester);
    }

    /// Resolve the role of a user id.
    pub async fn role_of(&self, user_id: i64) -> Role {
        let state = self.state.read().await;
        if user_id == state.owner_id && user_id != 0 {
            Role::Owner
        } else if state.admins.contains(&user_id) {
            Role::Admin
        } else {
            Role::Tester
        }
    }

    /// Look up a tester by username, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::TesterNotFound`] for unknown usernames.
    pub async fn stats(&self, username: &str) -> RosterResult<Tester> {
        let wanted = clean_username(username);
        let state = self.state.read().await;
        state
            .testers
            .values()
            .find(|t| t.username.eq_ignore_ascii_case(&wanted))
            .cloned()
            .ok_or(RosterError::TesterNotFound(wanted))
    }

    /// Active testers ordered by points, highest first.
    pub async fn rating(&self) -> Vec<Tester> {
        let state = self.state.read().await;
        let mut testers: Vec<Tester> = state
            .testers
            .values()
            .filter(|t| t.is_active)
            .cloned()
            .collect();
        testers.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a.username.cmp(&b.username))
        });
        testers
    }

    /// Add (or subtract) points.
    ///
    /// # Errors
    ///
    /// Rejects zero amounts and amounts beyond [`MAX_AWARD`].
    pub async fn award_points(&self, username: &str, amount: i64, reason: &str) -> RosterResult<Tester> {
        if amount == 0 || amount.abs() > MAX_AWARD {
            return Err(RosterError::rejected(format!(
                "Points must be between -{MAX_AWARD} and {MAX_AWARD}, excluding 0"
            )));
        }
        let mut state = self.state.write().await;
        let tester = state.find_mut(username)?;
        tester.total_points += amount;
        info!(username = %tester.username, amount, reason, total = tester.total_points, "points awarded");
        Ok(tester.clone())
    }

    /// Record a warning; the tester is deactivated at [`MAX_WARNINGS`].
    ///
    /// # Errors
    ///
    /// Fails for unknown or already deactivated testers.
    pub async fn issue_warning(&self, username: &str, reason: &str) -> RosterResult<Tester> {
        let mut state = self.state.write().await;
        let tester = state.find_mut(username)?;
        if !tester.is_active {
            return Err(RosterError::rejected(format!(
                "@{} is already deactivated",
                tester.username
            )));
        }
        tester.warnings_count += 1;
        if tester.warnings_count >= MAX_WARNINGS {
            tester.is_active = false;
        }
        info!(
            username = %tester.username,
            reason,
            warnings = tester.warnings_count,
            active = tester.is_active,
            "warning issued"
        );
        Ok(tester.clone())
    }

    /// Remove one warning, reactivating the tester.
    ///
    /// # Errors
    ///
    /// Fails for unknown testers or testers without warnings.
    pub async fn remove_warning(&self, username: &str) -> RosterResult<Tester> {
        let mut state = self.state.write().await;
        let tester = state.find_mut(username)?;
        if tester.warnings_count == 0 {
            return Err(RosterError::rejected(format!(
                "@{} has no warnings",
                tester.username
            )));
        }
        tester.warnings_count -= 1;
        tester.is_active = true;
        Ok(tester.clone())
    }

    /// Grant or revoke admin rights. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// The owner's own rights cannot be changed.
    pub async fn set_admin(&self, user_id: i64, grant: bool) -> RosterResult<bool> {
        let mut state = self.state.write().await;
        if user_id == state.owner_id {
            return Err(RosterError::rejected("The owner's rights cannot be changed"));
        }
        let changed = if grant {
            state.admins.insert(user_id)
        } else {
            state.admins.remove(&user_id)
        };
        info!(user_id, grant, changed, "admin rights updated");
        Ok(changed)
    }

    /// Store a task draft.
    ///
    /// # Errors
    ///
    /// Rejects drafts with an empty title.
    pub async fn create_task(
        &self,
        title: &str,
        description: &str,
        created_by: i64,
    ) -> RosterResult<TaskDraft> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RosterError::rejected("Task title is empty"));
        }
        let draft = TaskDraft {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.trim().to_string(),
            created_by,
        };
        self.state.write().await.tasks.push(draft.clone());
        Ok(draft)
    }

    /// All task drafts, oldest first.
    pub async fn tasks(&self) -> Vec<TaskDraft> {
        self.state.read().await.tasks.clone()
    }

    /// Number of testers.
    pub async fn len(&self) -> usize {
        self.state.read().await.testers.len()
    }

    /// Whether the roster has no testers.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.testers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn roster() -> Roster {
        let roster = Roster::new(1);
        roster.add_tester(Tester::new(10, "kate", "Kate K")).await;
        roster.add_tester(Tester::new(11, "max", "Max M")).await;
        roster
    }

    #[tokio::test]
    async fn test_roles() {
        let roster = roster().await;
        roster.set_admin(2, true).await.unwrap();
        assert_eq!(roster.role_of(1).await, Role::Owner);
        assert_eq!(roster.role_of(2).await, Role::Admin);
        assert_eq!(roster.role_of(10).await, Role::Tester);
        assert!(roster.set_admin(1, false).await.is_err());
        assert!(!roster.set_admin(2, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_points_and_rating() {
        let roster = roster().await;
        roster.award_points("@Max", 30, "crash repro").await.unwrap();
        roster.award_points("kate", 10, "report").await.unwrap();
        let rating = roster.rating().await;
        assert_eq!(rating[0].username, "max");
        assert_eq!(rating[1].total_points, 10);

        assert!(roster.award_points("kate", 0, "noop").await.is_err());
        assert_eq!(
            roster.award_points("nobody", 5, "x").await.unwrap_err(),
            RosterError::not_found("nobody")
        );
    }

    #[tokio::test]
    async fn test_warnings_deactivate() {
        let roster = roster().await;
        for _ in 0..MAX_WARNINGS {
            roster.issue_warning("kate", "missed game").await.unwrap();
        }
        let kate = roster.stats("kate").await.unwrap();
        assert!(!kate.is_active);
        assert!(roster.issue_warning("kate", "again").await.is_err());
        assert_eq!(roster.rating().await.len(), 1);

        let kate = roster.remove_warning("kate").await.unwrap();
        assert!(kate.is_active);
        assert_eq!(kate.warnings_count, MAX_WARNINGS - 1);
        assert!(roster.remove_warning("max").await.is_err());
    }

    #[tokio::test]
    async fn test_tasks() {
        let roster = roster().await;
        assert!(roster.create_task("  ", "x", 1).await.is_err());
        let draft = roster.create_task("Test installer", "on Windows", 1).await.unwrap();
        assert_eq!(roster.tasks().await, vec![draft]);
    }
}
