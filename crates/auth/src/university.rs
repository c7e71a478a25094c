//! Built-in catalog for the university deployment.

use crate::catalog::{Catalog, PermissionSpec, RoleSpec};
use crate::permissions::Permission;
use crate::vocabulary::{Action, Resource, RoleName};

use Action::*;
use Resource::*;

const PERMISSIONS: &[(Action, Resource, &str)] = &[
    (View, Users, "View user accounts"),
    (Create, Users, "Create user accounts"),
    (Update, Users, "Update user accounts"),
    (Delete, Users, "Delete user accounts"),
    (View, Roles, "View roles and their permissions"),
    (Update, Roles, "Change role definitions"),
    (Assign, Roles, "Assign roles to users"),
    (View, Courses, "View courses"),
    (Create, Courses, "Create courses"),
    (Update, Courses, "Update courses"),
    (Delete, Courses, "Delete courses"),
    (View, Results, "View examination results"),
    (Create, Results, "Enter examination results"),
    (Update, Results, "Amend examination results"),
    (Approve, Results, "Approve examination results for release"),
    (View, Transcripts, "View transcripts"),
    (Create, Transcripts, "Create transcripts"),
    (Update, Transcripts, "Update transcripts"),
    (Process, Transcripts, "Process transcript requests"),
    (View, Payments, "View fee payments"),
    (Create, Payments, "Record fee payments"),
    (Update, Payments, "Update fee payments"),
    (View, Attendance, "View attendance records"),
    (Create, Attendance, "Take attendance"),
    (Update, Attendance, "Correct attendance records"),
    (View, Hostels, "View hostel allocations"),
    (Create, Hostels, "Create hostel allocations"),
    (Update, Hostels, "Update hostel allocations"),
    (Delete, Hostels, "Remove hostel allocations"),
    (View, Reports, "View institutional reports"),
];

type Grants = &'static [(Resource, &'static [Action])];

const REGISTRAR: Grants = &[
    (Users, &[View, Create, Update]),
    (Transcripts, &[View, Create, Update, Process]),
    (Courses, &[View]),
];

const BURSAR: Grants = &[(Users, &[View]), (Payments, &[View, Create, Update])];

const DEAN: Grants = &[
    (Users, &[View, Update]),
    (Courses, &[View, Create, Update]),
    (Results, &[View, Approve]),
];

const HOD: Grants = DEAN;

const LECTURER: Grants = &[
    (Courses, &[View]),
    (Results, &[View, Create, Update]),
    (Attendance, &[View, Create, Update]),
];

const STUDENT: Grants = &[(Courses, &[View]), (Payments, &[View]), (Results, &[View])];

fn expand(grants: Grants) -> Vec<Permission> {
    grants
        .iter()
        .flat_map(|(resource, actions)| actions.iter().map(|a| Permission::new(*a, *resource)))
        .collect()
}

fn system_role(name: RoleName, description: &str, permissions: Vec<Permission>) -> RoleSpec {
    RoleSpec {
        name,
        description: description.to_string(),
        is_system_role: true,
        permissions,
    }
}

impl Catalog {
    /// The seed catalog provisioned for a university deployment.
    ///
    /// `admin` is granted every catalog permission; the remaining roles carry
    /// exactly the grants of the access matrix enforced at request time.
    pub fn university() -> Self {
        let permissions: Vec<PermissionSpec> = PERMISSIONS
            .iter()
            .map(|(action, resource, description)| PermissionSpec::new(*action, *resource, *description))
            .collect();
        let everything = permissions.iter().map(PermissionSpec::permission).collect();

        let roles = vec![
            system_role(RoleName::Admin, "System administrator with unrestricted access", everything),
            system_role(RoleName::Registrar, "Registry: student records and transcripts", expand(REGISTRAR)),
            system_role(RoleName::Bursar, "Bursary: fees and payments", expand(BURSAR)),
            system_role(RoleName::Dean, "Dean of faculty", expand(DEAN)),
            system_role(RoleName::Hod, "Head of department", expand(HOD)),
            system_role(RoleName::Lecturer, "Teaching staff", expand(LECTURER)),
            system_role(RoleName::Student, "Enrolled student", expand(STUDENT)),
        ];

        Self { permissions, roles }
    }
}
