//! Role-based permission map.
//!
//! Maps platform roles → permissions. Identity collaborators use it to turn
//! the roles of an account into the permission set carried by a
//! [`Principal`](crate::auth::Principal).

use std::collections::{BTreeSet, HashMap, HashSet};

/// Role → permissions mapping.
#[derive(Debug, Clone, Default)]
pub struct RoleMap {
    role_permissions: HashMap<String, HashSet<String>>,
}

impl RoleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock WordPress roles plus the two WooCommerce roles.
    pub fn with_wordpress_defaults() -> Self {
        let mut map = Self::new();

        let subscriber = ["read"];
        let contributor = [&subscriber[..], &["edit_posts", "delete_posts"]].concat();
        let author = [
            &contributor[..],
            &["upload_files", "publish_posts", "edit_published_posts"],
        ]
        .concat();
        let editor = [
            &author[..],
            &[
                "edit_pages",
                "publish_pages",
                "edit_others_posts",
                "edit_others_pages",
                "manage_categories",
                "moderate_comments",
            ],
        ]
        .concat();
        let administrator = [
            &editor[..],
            &[
                "create_users",
                "list_users",
                "edit_users",
                "promote_users",
                "manage_options",
                "manage_woocommerce",
                "edit_products",
            ],
        ]
        .concat();
        let shop_manager = [
            &subscriber[..],
            &[
                "edit_posts",
                "manage_categories",
                "manage_woocommerce",
                "edit_products",
                "list_users",
                "edit_users",
                "view_woocommerce_reports",
            ],
        ]
        .concat();

        for (role, perms) in [
            ("subscriber", &subscriber[..]),
            ("customer", &subscriber[..]),
            ("contributor", &contributor[..]),
            ("author", &author[..]),
            ("editor", &editor[..]),
            ("administrator", &administrator[..]),
            ("shop_manager", &shop_manager[..]),
        ] {
            for perm in perms {
                map.grant_permission_to_role(role, perm);
            }
        }
        map
    }

    /// Grant a permission to a role, creating the role if needed.
    pub fn grant_permission_to_role(&mut self, role: &str, permission: &str) {
        self.role_permissions
            .entry(role.to_string())
            .or_default()
            .insert(permission.to_string());
    }

    /// Whether the role is known.
    pub fn role_exists(&self, role: &str) -> bool {
        self.role_permissions.contains_key(role)
    }

    /// Union of the permissions of every listed role. Unknown roles grant nothing.
    pub fn permissions_for<S: AsRef<str>>(&self, roles: &[S]) -> BTreeSet<String> {
        roles
            .iter()
            .filter_map(|role| self.role_permissions.get(role.as_ref()))
            .flat_map(|perms| perms.iter().cloned())
            .collect()
    }
}
