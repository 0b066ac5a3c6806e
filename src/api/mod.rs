pub mod attendance;
pub mod department;
pub mod employee;
pub mod leave_request;
pub mod payroll;
pub mod profile;
pub mod salary_structure;
pub mod todo;
