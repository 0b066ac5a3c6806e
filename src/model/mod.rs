pub mod attendance;
pub mod department;
pub mod leave;
pub mod role;
pub mod salary;
pub mod salary_structure;
pub mod todo;
pub mod user;
