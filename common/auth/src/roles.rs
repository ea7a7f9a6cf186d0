pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_REVIEWER: &str = "reviewer";
pub const ROLE_ANNOTATOR: &str = "annotator";
pub const ROLE_USER: &str = "user";

/// Sentinel accepted by [`RequiredRoles::from`] meaning "any recognised role".
pub const ANY_ROLE: &str = "*";

/// Roles a protected operation demands. The caller needs at least one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredRoles {
    /// Expands to the four configured role names.
    AnyKnown,
    OneOf(Vec<String>),
}

impl RequiredRoles {
    pub fn one_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(roles.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for RequiredRoles {
    fn from(value: &str) -> Self {
        if value == ANY_ROLE {
            Self::AnyKnown
        } else {
            Self::OneOf(vec![value.to_string()])
        }
    }
}

impl From<&[&str]> for RequiredRoles {
    fn from(value: &[&str]) -> Self {
        Self::one_of(value.iter().copied())
    }
}
