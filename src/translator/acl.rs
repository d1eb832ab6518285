use super::types::RequestParams;
use super::QueryTranslator;
use crate::backend::{Acl, User};

impl QueryTranslator {
    /// ACL described by `params.acl`, or `None` when there is none.
    ///
    /// `currentUser` starts from read/write for `current_user` (an empty ACL
    /// when nobody is signed in). Public flags and permissions are applied on
    /// top, in order.
    pub fn build_acl(params: Option<&RequestParams>, current_user: Option<&User>) -> Option<Acl> {
        let spec = params?.acl.as_ref()?;

        let mut acl = match (spec.current_user, current_user) {
            (true, Some(user)) => Acl::for_user(user),
            (true, None) => {
                tracing::warn!("ACL requested for the current user but nobody is signed in");
                Acl::new()
            }
            (false, _) => Acl::new(),
        };

        if spec.allow_public_read { acl.set_public_read_access(true); }
        if spec.allow_public_write { acl.set_public_write_access(true); }

        for permission in &spec.permissions {
            if permission.is_role {
                let role = permission.role.as_deref().unwrap_or_default();
                acl.set_role_read_access(role, permission.allow_read);
                acl.set_role_write_access(role, permission.allow_write);
            } else {
                let id = permission.id.as_deref().unwrap_or_default();
                acl.set_read_access(id, permission.allow_read);
                acl.set_write_access(id, permission.allow_write);
            }
        }
        Some(acl)
    }
}
