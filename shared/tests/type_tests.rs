/// Integration-level tests for the `shared` crate.
///
/// Each section tests one module; unit tests that are tightly coupled to
/// private helpers live inside the modules themselves (see `#[cfg(test)]`
/// blocks in `employee.rs`, `role.rs` and `config.rs`).
// ---------------------------------------------------------------------------
// Session / login types
// ---------------------------------------------------------------------------
#[cfg(test)]
mod session_tests {
    use shared::types::*;

    fn login_json() -> &'static str {
        r#"{
            "access_token": "eyJ.abc.def",
            "user": {"id": 7, "email": "hr@example.com", "role": "hr"},
            "employee": {"name": "Grace", "department": "People", "employee_id": "EMP007"}
        }"#
    }

    #[test]
    fn login_response_becomes_session() {
        let login: LoginResponse = serde_json::from_str(login_json()).unwrap();
        let session = Session::from(login);
        assert_eq!(session.token, "eyJ.abc.def");
        assert_eq!(session.user.role, Role::Hr);
        assert_eq!(session.employee.unwrap().employee_id, "EMP007");
    }

    #[test]
    fn login_response_without_employee_profile() {
        let json = r#"{"access_token":"t","user":{"id":1,"email":"a@b.co","role":"admin"}}"#;
        let login: LoginResponse = serde_json::from_str(json).unwrap();
        assert!(login.employee.is_none());
    }

    #[test]
    fn session_debug_redacts_token() {
        let login: LoginResponse = serde_json::from_str(login_json()).unwrap();
        let out = format!("{:?}", Session::from(login));
        assert!(!out.contains("eyJ.abc.def"));
        assert!(out.contains("hr@example.com"));
    }

    #[test]
    fn session_persists_through_json() {
        let login: LoginResponse = serde_json::from_str(login_json()).unwrap();
        let session = Session::from(login);
        let text = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&text).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn unknown_role_in_profile_degrades_to_employee() {
        let json = r#"{"id":3,"email":"f@x.io","role":"finance"}"#;
        let user: SessionUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::Employee);
    }

    #[test]
    fn login_data_accepts_username_alias() {
        let d: LoginData = serde_json::from_str(r#"{"username":"a@b.co","password":"x"}"#).unwrap();
        assert_eq!(d.email, "a@b.co");
    }
}

// ---------------------------------------------------------------------------
// Capability table
// ---------------------------------------------------------------------------

#[cfg(test)]
mod role_tests {
    use shared::types::*;

    #[test]
    fn admin_sees_every_page() {
        let nav = Authorizer::new(Role::Admin).nav_items();
        assert_eq!(nav.len(), Page::ALL.len());
        assert_eq!(nav[0].href, "/dashboard");
    }

    #[test]
    fn nav_items_follow_page_access() {
        for role in [Role::Admin, Role::Hr, Role::Employee] {
            let auth = Authorizer::new(role);
            for page in Page::ALL {
                let listed = auth.nav_items().iter().any(|n| n.href == page.path());
                assert_eq!(listed, auth.can_open(page), "{role} / {:?}", page);
            }
        }
    }

    #[test]
    fn only_admin_deletes_employees() {
        assert!(Authorizer::new(Role::Admin).allows(Capability::DeleteEmployees));
        assert!(!Authorizer::new(Role::Hr).allows(Capability::DeleteEmployees));
        assert!(!Authorizer::new(Role::Employee).allows(Capability::DeleteEmployees));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Hr).unwrap(), "\"hr\"");
    }
}

// ---------------------------------------------------------------------------
// Employee records
// ---------------------------------------------------------------------------

#[cfg(test)]
mod employee_tests {
    use chrono::NaiveDate;
    use shared::types::*;

    fn backend_employee() -> Employee {
        serde_json::from_str(
            r#"{
                "id": 12,
                "name": "Ada",
                "email": "ada@example.com",
                "employee_id": "EMP012",
                "department": "Engineering",
                "position": null,
                "phone": "555",
                "hire_date": "2020-01-15",
                "is_active": true,
                "basic_salary": 4200.5,
                "created_at": "2020-01-15T09:00:00"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn backend_employee_deserializes_with_sparse_fields() {
        let e = backend_employee();
        assert_eq!(e.basic_salary, Some(4200.5));
        assert_eq!(e.hire_date, NaiveDate::from_ymd_opt(2020, 1, 15));
        assert!(e.position.is_none());
        assert!(e.bank_name.is_none());
    }

    #[test]
    fn payroll_employee_current_salary_alias() {
        let e: Employee = serde_json::from_str(
            r#"{"id":1,"name":"A","email":"a@b.co","employee_id":"E1","current_salary":300}"#,
        )
        .unwrap();
        assert_eq!(e.basic_salary, Some(300.0));
        assert!(e.is_active);
    }

    #[test]
    fn draft_from_employee_keeps_submitted_values() {
        let e = backend_employee();
        let draft = EmployeeDraft::from(&e);
        assert_eq!(draft.name, e.name);
        assert_eq!(draft.department, "Engineering");
        assert_eq!(draft.basic_salary, 4200.5);
        assert_eq!(draft.hire_date, e.hire_date);
    }

    #[test]
    fn employee_without_salary_fails_validation_when_edited() {
        let mut e = backend_employee();
        e.basic_salary = None;
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            EmployeeDraft::from(&e).validate(today),
            Err(DraftError::NonPositiveSalary)
        );
    }

    #[test]
    fn draft_error_messages_are_readable() {
        assert_eq!(DraftError::MissingField("Name").to_string(), "Name is required");
        assert_eq!(
            DraftError::FutureDate("Date of birth").to_string(),
            "Date of birth cannot be in the future"
        );
    }
}

// ---------------------------------------------------------------------------
// Backend error bodies
// ---------------------------------------------------------------------------

#[cfg(test)]
mod backend_error_tests {
    use shared::types::*;

    #[test]
    fn validation_details_are_exposed() {
        let e = BackendError::from_slice(br#"{"error":"Validation failed","details":["email taken"]}"#);
        assert_eq!(e.validation_details(), Some(&["email taken".to_string()][..]));
        assert_eq!(e.message_or("x"), "Validation failed");
    }

    #[test]
    fn non_json_body_falls_back() {
        let e = BackendError::from_slice(b"<html>oops</html>");
        assert!(e.validation_details().is_none());
        assert_eq!(e.message_or("Failed to save employee"), "Failed to save employee");
    }

    #[test]
    fn message_field_is_used_when_error_missing() {
        let e = BackendError::from_slice(br#"{"message":"Employee not found"}"#);
        assert_eq!(e.message_or("x"), "Employee not found");
    }

    #[test]
    fn gateway_error_body_shape() {
        let json = serde_json::to_value(ErrorResponse::new("UNAUTHORIZED", "nope")).unwrap();
        assert_eq!(json["error"], "nope");
        assert_eq!(json["code"], "UNAUTHORIZED");
    }
}

// ---------------------------------------------------------------------------
// Bulk payroll candidates
// ---------------------------------------------------------------------------

#[cfg(test)]
mod bulk_tests {
    use proptest::prelude::*;
    use shared::types::*;

    fn employee(id: i64) -> Employee {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("E{id}"),
            "email": format!("e{id}@x.io"),
            "employee_id": format!("EMP{id}"),
        }))
        .unwrap()
    }

    fn run(employee_id: i64, month: u32, year: i32) -> PayrollRun {
        PayrollRun {
            id: employee_id * 100 + month as i64,
            employee_id,
            employee_name: None,
            month,
            year,
            basic_salary: 1000.0,
            deductions: 0.0,
            net_salary: 1000.0,
            status: RunStatus::Draft,
        }
    }

    #[test]
    fn excludes_employees_with_a_run_for_the_period() {
        let employees = vec![employee(1), employee(2), employee(3)];
        let runs = vec![run(1, 5, 2024), run(2, 4, 2024), run(3, 5, 2023)];
        let ids: Vec<i64> = available_employees(&employees, &runs, 5, 2024)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    proptest! {
        #[test]
        fn result_is_exact_set_difference(
            ids in proptest::collection::btree_set(1i64..50, 0..20),
            runs in proptest::collection::vec((1i64..50, 1u32..=12, 2022i32..=2024), 0..30),
            month in 1u32..=12,
            year in 2022i32..=2024,
        ) {
            let employees: Vec<Employee> = ids.iter().map(|id| employee(*id)).collect();
            let runs: Vec<PayrollRun> = runs.into_iter().map(|(e, m, y)| run(e, m, y)).collect();
            let available = available_employees(&employees, &runs, month, year);

            for e in &employees {
                let has_run = runs.iter().any(|r| r.employee_id == e.id && r.month == month && r.year == year);
                let listed = available.iter().any(|a| a.id == e.id);
                prop_assert_eq!(listed, !has_run);
            }
        }
    }
}
