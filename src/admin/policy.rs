/// Authorization check and target-mutability policy
///
/// Pure decision functions. They are evaluated on the server for every
/// destructive action and reused to compute the advisory flags returned
/// to console clients, so the two can never disagree.
use crate::admin::Role;
use crate::error::{HubError, HubResult};
use serde::Serialize;

/// Outcome of the authorization check for one authenticated caller.
///
/// `is_admin` and `is_principal` are reported independently. Console access
/// is granted to either; see [`Caller::has_admin_access`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub is_principal: bool,
}

impl Caller {
    /// Derive the caller's privileges from their role rows and the optional
    /// configured principal email.
    pub fn from_roles(
        user_id: &str,
        email: Option<&str>,
        roles: &[Role],
        principal_email: Option<&str>,
    ) -> Self {
        let email_is_principal = match (email, principal_email) {
            (Some(email), Some(principal)) => email.trim().eq_ignore_ascii_case(principal.trim()),
            _ => false,
        };

        Self {
            user_id: user_id.to_string(),
            email: email.map(str::to_string),
            is_admin: roles.contains(&Role::Admin),
            is_principal: roles.contains(&Role::SuperAdmin) || email_is_principal,
        }
    }

    /// The principal outranks an admin, so it may use the console without
    /// holding an `admin` row of its own.
    pub fn has_admin_access(&self) -> bool {
        self.is_admin || self.is_principal
    }

    pub fn flags(&self) -> AuthorizationFlags {
        AuthorizationFlags {
            is_admin: self.is_admin,
            is_principal: self.is_principal,
        }
    }
}

/// Advisory booleans for presentation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationFlags {
    pub is_admin: bool,
    pub is_principal: bool,
}

/// May `caller` ban, unban or delete `target_id`?
///
/// Self-targeting is always refused. Admin targets are reserved to the
/// principal.
pub fn can_moderate(caller: &Caller, target_id: &str, target_is_admin: bool) -> bool {
    if target_id == caller.user_id {
        return false;
    }
    if target_is_admin {
        return caller.is_principal;
    }
    true
}

pub fn ensure_can_moderate(caller: &Caller, target_id: &str, target_is_admin: bool) -> HubResult<()> {
    if can_moderate(caller, target_id, target_is_admin) {
        Ok(())
    } else {
        Err(HubError::Authorization(
            "You cannot moderate this account".to_string(),
        ))
    }
}

pub fn ensure_admin(caller: &Caller) -> HubResult<()> {
    if caller.has_admin_access() {
        Ok(())
    } else {
        Err(HubError::Authorization("Admin only".to_string()))
    }
}

pub fn ensure_principal(caller: &Caller) -> HubResult<()> {
    if caller.is_principal {
        Ok(())
    } else {
        Err(HubError::Authorization(
            "Only the principal admin can change admin roles".to_string(),
        ))
    }
}

/// The principal may not demote itself.
pub fn ensure_can_demote(caller: &Caller, target_id: &str) -> HubResult<()> {
    ensure_principal(caller)?;
    if target_id == caller.user_id {
        return Err(HubError::Authorization(
            "You cannot demote yourself".to_string(),
        ));
    }
    Ok(())
}
