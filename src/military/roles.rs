use super::duo::DuoRole;
use super::tasks::AgentSnapshot;
use crate::identifiers::AgentId;

/// Which rule settled the leader/support split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleSource {
    Tag,
    Label,
    Recorded,
    IdentityOrder,
}

#[derive(Clone, Copy, Debug)]
pub struct RoleResolution<'s> {
    pub leader: &'s AgentSnapshot,
    pub support: &'s AgentSnapshot,
    pub source: RoleSource,
}

/// Infer a role from an assignment label.
pub fn role_from_label(label: &str) -> Option<DuoRole> {
    let label = label.to_lowercase();

    if ["lead", "tank", "attack"].iter().any(|hint| label.contains(hint)) {
        Some(DuoRole::Leader)
    } else if ["support", "heal", "medic"].iter().any(|hint| label.contains(hint)) {
        Some(DuoRole::Support)
    } else {
        None
    }
}

fn by_roles<'s>(
    first: &'s AgentSnapshot,
    second: &'s AgentSnapshot,
    first_role: Option<DuoRole>,
    second_role: Option<DuoRole>,
    source: RoleSource,
) -> Option<RoleResolution<'s>> {
    let first_leads = match (first_role, second_role) {
        (Some(a), Some(b)) if a == b => return None,
        (Some(DuoRole::Leader), _) | (_, Some(DuoRole::Support)) => true,
        (Some(DuoRole::Support), _) | (_, Some(DuoRole::Leader)) => false,
        (None, None) => return None,
    };

    let (leader, support) = if first_leads { (first, second) } else { (second, first) };

    Some(RoleResolution { leader, support, source })
}

/// Deterministically split a pair into leader and support. Earlier rules win:
/// explicit tag, then label, then the previously recorded assignment, then id order.
pub fn resolve_roles<'s>(
    first: &'s AgentSnapshot,
    second: &'s AgentSnapshot,
    recorded_leader: Option<&AgentId>,
    recorded_support: Option<&AgentId>,
) -> RoleResolution<'s> {
    if let Some(resolution) = by_roles(first, second, first.role, second.role, RoleSource::Tag) {
        return resolution;
    }

    let first_label = first.label.as_deref().and_then(role_from_label);
    let second_label = second.label.as_deref().and_then(role_from_label);

    if let Some(resolution) = by_roles(first, second, first_label, second_label, RoleSource::Label) {
        return resolution;
    }

    let recorded_role = |agent: &AgentSnapshot| {
        if recorded_leader == Some(&agent.id) {
            Some(DuoRole::Leader)
        } else if recorded_support == Some(&agent.id) {
            Some(DuoRole::Support)
        } else {
            None
        }
    };

    if let Some(resolution) = by_roles(first, second, recorded_role(first), recorded_role(second), RoleSource::Recorded) {
        return resolution;
    }

    let (leader, support) = if first.id <= second.id { (first, second) } else { (second, first) };

    RoleResolution {
        leader,
        support,
        source: RoleSource::IdentityOrder,
    }
}

/// Role for a member whose partner is gone.
pub fn resolve_single(agent: &AgentSnapshot, recorded_leader: Option<&AgentId>, recorded_support: Option<&AgentId>) -> DuoRole {
    agent
        .role
        .or_else(|| agent.label.as_deref().and_then(role_from_label))
        .or_else(|| {
            if recorded_support == Some(&agent.id) && recorded_leader != Some(&agent.id) {
                Some(DuoRole::Support)
            } else {
                None
            }
        })
        .unwrap_or(DuoRole::Leader)
}
