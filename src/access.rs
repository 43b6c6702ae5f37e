//! Role and permission checks consulted before lifecycle transitions

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Operator,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageProducts,
    ApproveRequests,
    ManageQuotations,
    ConfirmWithdrawals,
}

/// The identity performing an operation. Names feed the `approved_by`,
/// `authorized_by` and `received_by` fields on persisted records.
#[derive(Debug, Clone)]
pub struct Actor {
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(name: &str, role: Role) -> Self {
        Self {
            name: name.to_string(),
            role,
        }
    }
}

pub fn role_allows(role: Role, permission: Permission) -> bool {
    match role {
        Role::Admin => true,
        // operators run the day-to-day flow but approvals stay with admins
        Role::Operator => !matches!(permission, Permission::ApproveRequests),
        Role::Viewer => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_every_permission() {
        for permission in [
            Permission::ManageProducts,
            Permission::ApproveRequests,
            Permission::ManageQuotations,
            Permission::ConfirmWithdrawals,
        ] {
            assert!(role_allows(Role::Admin, permission));
        }
    }

    #[test]
    fn operator_cannot_approve() {
        assert!(!role_allows(Role::Operator, Permission::ApproveRequests));
        assert!(role_allows(Role::Operator, Permission::ConfirmWithdrawals));
    }

    #[test]
    fn viewer_cannot_mutate() {
        for permission in [
            Permission::ManageProducts,
            Permission::ApproveRequests,
            Permission::ManageQuotations,
            Permission::ConfirmWithdrawals,
        ] {
            assert!(!role_allows(Role::Viewer, permission));
        }
    }
}
