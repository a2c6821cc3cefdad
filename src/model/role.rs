#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    System = 4,
    ApiUser = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::System),
            5 => Some(Role::ApiUser),
            _ => None,
        }
    }

    /// Roles allowed to review and correct other employees' attendance.
    pub fn manages_attendance(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_hr_and_admin_manage_attendance() {
        let managers: Vec<_> = (0..=6)
            .filter_map(Role::from_id)
            .filter(|r| r.manages_attendance())
            .collect();
        assert_eq!(managers, vec![Role::Admin, Role::Hr]);
    }
}
