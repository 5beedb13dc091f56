//! Team membership: who may do what, and the roster view that applies it.
//!
//! These checks are a UX gate only. The server re-checks every one of them
//! and is the real authority.

use crate::api::{ApiClient, ApiError};
use crate::error::ClientError;
use crate::model::{MemberId, Role, Team, TeamId, TeamMember, UserId};
use crate::notice::Notice;
use tracing::warn;

// ── Rules ──────────────────────────────────────────────────────

impl Role {
    /// Only the owner may delete a team.
    pub fn can_delete_team(self) -> bool {
        self == Role::Owner
    }

    /// Owners and admins may invite and remove members.
    pub fn can_manage_members(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

/// The owner can never be removed, whoever asks.
pub fn check_removal(actor: Option<Role>, target: &TeamMember) -> Result<(), ClientError> {
    if target.role == Role::Owner {
        return Err(ClientError::Forbidden("the team owner cannot be removed".into()));
    }
    match actor {
        Some(role) if role.can_manage_members() => Ok(()),
        _ => Err(ClientError::Forbidden("only owners and admins can remove members".into())),
    }
}

pub fn check_invite(actor: Option<Role>) -> Result<(), ClientError> {
    match actor {
        Some(role) if role.can_manage_members() => Ok(()),
        _ => Err(ClientError::Forbidden("only owners and admins can invite members".into())),
    }
}

pub fn check_delete(actor: Option<Role>) -> Result<(), ClientError> {
    match actor {
        Some(role) if role.can_delete_team() => Ok(()),
        _ => Err(ClientError::Forbidden("only the team owner can delete the team".into())),
    }
}

/// The role `user_id` holds among `members`, if any.
pub fn role_of(members: &[TeamMember], user_id: UserId) -> Option<Role> {
    members.iter().find(|m| m.user.id == user_id).map(|m| m.role)
}

// ── Roster ─────────────────────────────────────────────────────

/// The signed-in user's teams, the selected one, and its members.
///
/// Unlike tasks, nothing here is optimistic: local lists change only after
/// the server has said yes.
pub struct TeamRoster {
    user_id: UserId,
    teams: Vec<Team>,
    selected: Option<TeamId>,
    members: Vec<TeamMember>,
}

impl TeamRoster {
    pub fn new(user_id: UserId) -> Self {
        TeamRoster { user_id, teams: Vec::new(), selected: None, members: Vec::new() }
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn members(&self) -> &[TeamMember] {
        &self.members
    }

    pub fn selected(&self) -> Option<&Team> {
        let id = self.selected?;
        self.teams.iter().find(|t| t.id == id)
    }

    /// The signed-in user's role in the selected team.
    pub fn my_role(&self) -> Option<Role> {
        self.selected?;
        role_of(&self.members, self.user_id)
    }

    /// Fetch the team list. Selects the first team if none is selected.
    pub async fn load(&mut self, api: &ApiClient) -> Result<(), ApiError> {
        self.teams = api.teams().await?;
        let still_there = self
            .selected
            .is_some_and(|id| self.teams.iter().any(|t| t.id == id));
        if !still_there {
            self.selected = None;
            self.members.clear();
            if let Some(first) = self.teams.first().map(|t| t.id) {
                self.select(api, first).await?;
            }
        }
        Ok(())
    }

    /// Select a team and fetch its members.
    pub async fn select(&mut self, api: &ApiClient, team_id: TeamId) -> Result<(), ApiError> {
        let members = api.team_members(team_id).await?;
        self.selected = Some(team_id);
        self.members = members;
        Ok(())
    }

    /// Create a team; it becomes the selection.
    pub async fn create_team(
        &mut self,
        api: &ApiClient,
        name: &str,
        description: &str,
    ) -> Result<Notice, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::Validation("team name is required".into()));
        }
        let team = api
            .create_team(name, description)
            .await
            .inspect_err(|e| warn!("failed to create team: {e}"))?;
        let notice = Notice::success(format!("team \"{}\" created", team.name));
        let team_id = team.id;
        self.teams.push(team);
        self.select(api, team_id).await?;
        Ok(notice)
    }

    /// Invite a user by name into the selected team.
    pub async fn invite(&mut self, api: &ApiClient, username: &str) -> Result<Notice, ClientError> {
        let team_id = self.selected_id()?;
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::Validation("username is required".into()));
        }
        check_invite(self.my_role())?;

        let member = api
            .invite_member(team_id, username)
            .await
            .inspect_err(|e| warn!(team_id, "failed to invite {username}: {e}"))?;
        self.members.push(member);
        Ok(Notice::success(format!("{username} joined the team")))
    }

    /// Remove a member from the selected team.
    pub async fn remove_member(
        &mut self,
        api: &ApiClient,
        member_id: MemberId,
    ) -> Result<Notice, ClientError> {
        let team_id = self.selected_id()?;
        let target = self
            .members
            .iter()
            .find(|m| m.id == member_id)
            .cloned()
            .ok_or_else(|| ClientError::Validation(format!("no member {member_id} in this team")))?;
        check_removal(self.my_role(), &target)?;

        api.remove_member(team_id, member_id)
            .await
            .inspect_err(|e| warn!(team_id, member_id, "failed to remove member: {e}"))?;
        self.members.retain(|m| m.id != member_id);
        Ok(Notice::success(format!("{} was removed from the team", target.user.username)))
    }

    /// Delete a team. Only its owner may. The server also refuses while the
    /// team still has unfinished tasks; that refusal comes back as its message.
    pub async fn delete_team(&mut self, api: &ApiClient, team_id: TeamId) -> Result<Notice, ClientError> {
        let role = if self.selected == Some(team_id) {
            self.my_role()
        } else {
            let members = api.team_members(team_id).await?;
            role_of(&members, self.user_id)
        };
        check_delete(role)?;

        let name = self
            .teams
            .iter()
            .find(|t| t.id == team_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("#{team_id}"));

        api.delete_team(team_id)
            .await
            .inspect_err(|e| warn!(team_id, "failed to delete team: {e}"))?;

        self.teams.retain(|t| t.id != team_id);
        if self.selected == Some(team_id) {
            self.selected = None;
            self.members.clear();
        }
        Ok(Notice::success(format!("team \"{name}\" deleted")))
    }

    fn selected_id(&self) -> Result<TeamId, ClientError> {
        self.selected
            .ok_or_else(|| ClientError::Validation("no team selected".into()))
    }
}

// ── Tests ──────────────────────────────────────────────────────
