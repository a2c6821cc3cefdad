pub mod attendance;
pub mod attendance_admin;

#[cfg(test)]
pub(crate) mod testing;
