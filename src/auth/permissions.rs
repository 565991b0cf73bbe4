use anyhow::Error;
use once_cell::sync::Lazy;
use rocket::serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    EditOwnProfile,
    ViewOwnAssignments,
    RecordExecutions,

    ViewAllTrainees,
    ManageTrainees,
    CreatePlans,
    AssignPlans,
    ViewTraineeProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Role {
    Trainee,
    Coach,
}

static TRAINEE_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);
    permissions.insert(Permission::ViewOwnAssignments);
    permissions.insert(Permission::RecordExecutions);

    permissions
});

static COACH_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);

    permissions.insert(Permission::ViewAllTrainees);
    permissions.insert(Permission::ManageTrainees);
    permissions.insert(Permission::CreatePlans);
    permissions.insert(Permission::AssignPlans);
    permissions.insert(Permission::ViewTraineeProgress);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Trainee => &TRAINEE_PERMISSIONS,
            Role::Coach => &COACH_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Trainee => "trainee",
            Role::Coach => "coach",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "trainee" => Ok(Role::Trainee),
            "coach" => Ok(Role::Coach),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
