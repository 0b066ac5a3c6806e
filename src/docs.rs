use crate::api::{
    attendance::LogAttendance,
    department::CreateDepartment,
    leave_request::{ApplyLeave, DecideLeave, LeaveListItem, LeaveSummary},
    payroll::{GenerateSalary, SalaryListItem},
    profile::ChangePasswordReq,
    salary_structure::CreateSalaryStructure,
    todo::{CreateTodo, UpdateTodo},
};
use crate::model::{
    attendance::{Attendance, AttendanceStatus},
    department::Department,
    leave::{Leave, LeaveStatus, LeaveType},
    role::Role,
    salary::Salary,
    salary_structure::SalaryStructure,
    todo::Todo,
    user::UserProfile,
};
use crate::models::{AuthResponse, LoginReqDto, NewUserReq, TokenPair, UserSummary};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRMS API",
        version = "1.0.0",
        description = r#"
## Human Resource Management System (HRMS)

Backend for day-to-day HR operations.

### Key Features
- **Employee Management**: admins create, update, list and remove employee profiles
- **Self-service Profile**: employees edit their own details and change their password
- **Departments**
- **Leave Management**: apply, approve or reject, leave balance tracking
- **Attendance**: daily clock-in/clock-out with derived day status
- **Payroll**: salary structures and monthly salaries generated from attendance
- **Notice Board**: personal todo items

### Security
Everything under `/api` requires a **JWT Bearer** access token.
Admin-only operations are marked in each endpoint's description.

### Response Format
- JSON bodies, snake_case fields
- Errors are `{ "message": "..." }`
- List endpoints with filters return `{ data, page, per_page, total }`
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::profile::get_my_profile,
        crate::api::profile::update_my_profile,
        crate::api::profile::change_password,

        crate::api::department::create_department,
        crate::api::department::list_departments,
        crate::api::department::update_department,
        crate::api::department::delete_department,

        crate::api::leave_request::apply_leave,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::my_leave_summary,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::decide_leave,
        crate::api::leave_request::delete_leave,

        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::my_records,
        crate::api::attendance::employee_records,
        crate::api::attendance::log_attendance,

        crate::api::salary_structure::create_structure,
        crate::api::salary_structure::list_structures,
        crate::api::salary_structure::update_structure,
        crate::api::salary_structure::delete_structure,

        crate::api::payroll::generate_salary,
        crate::api::payroll::list_salaries,
        crate::api::payroll::employee_salaries,
        crate::api::payroll::my_salaries,

        crate::api::todo::list_todos,
        crate::api::todo::create_todo,
        crate::api::todo::update_todo,
        crate::api::todo::delete_todo
    ),
    components(
        schemas(
            NewUserReq,
            LoginReqDto,
            UserSummary,
            AuthResponse,
            TokenPair,
            Role,
            UserProfile,
            ChangePasswordReq,
            Department,
            CreateDepartment,
            LeaveType,
            LeaveStatus,
            Leave,
            ApplyLeave,
            DecideLeave,
            LeaveSummary,
            LeaveListItem,
            AttendanceStatus,
            Attendance,
            LogAttendance,
            SalaryStructure,
            CreateSalaryStructure,
            Salary,
            GenerateSalary,
            SalaryListItem,
            Todo,
            CreateTodo,
            UpdateTodo
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Employee", description = "Employee management APIs (admin)"),
        (name = "Profile", description = "Self-service profile APIs"),
        (name = "Department", description = "Department APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Salary Structure", description = "Pay templates per role, position and department"),
        (name = "Payroll", description = "Monthly salary generation and payslips"),
        (name = "Todo", description = "Personal notice board items"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
