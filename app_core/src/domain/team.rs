//! Team / TeamMember (spec §3). A team belongs to one tournament, has a
//! unique join code, one leader and between 1 and `max_team_size` members.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Team {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub join_code: String,
    pub leader_user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
}

impl Team {
    /// Pick the next leader after the current one departs (oldest
    /// remaining member by join order). Returns `None` when the team
    /// has no members left, in which case the caller deletes the team
    /// (spec §3 invariant).
    pub fn next_leader<'a>(&self, remaining_members: &'a [TeamMember]) -> Option<&'a TeamMember> {
        remaining_members
            .iter()
            .find(|m| m.user_id != self.leader_user_id)
            .or_else(|| remaining_members.first())
    }
}
