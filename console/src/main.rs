use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use console::form::EmployeeForm;
use console::pages::*;
use console::{ApiClient, FileStorage, HyperTransport, Navigation, SessionStore};
use shared::types::{EmployeeDraft, LoginData, RegistrationData, Role, SessionEmployee};

/// Terminal client for the payroll gateway.
#[derive(Debug, Parser)]
#[command(name = "payroll-console", version)]
struct Cli {
    /// Gateway base URL.
    #[arg(long, env = "PAYROLL_GATEWAY", default_value = "http://127.0.0.1:3000")]
    gateway: String,

    /// Where the session is kept between commands.
    #[arg(long, env = "PAYROLL_SESSION", default_value = ".payroll-session.json")]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PAYROLL_PASSWORD")]
        password: String,
    },
    /// Create an account.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PAYROLL_PASSWORD")]
        password: String,
        #[arg(long, default_value = "employee")]
        role: String,
        /// Employee profile name, for hr and employee accounts.
        #[arg(long, requires = "employee_id")]
        name: Option<String>,
        #[arg(long)]
        employee_id: Option<String>,
        #[arg(long)]
        department: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Show the signed-in user as the backend sees it.
    Whoami,
    /// Request a page with the session cookie and report the guard's answer.
    Page {
        path: String,
        /// Must match the gateway's `session.cookie_name`.
        #[arg(long, env = "PAYROLL_COOKIE", default_value = "token")]
        cookie_name: String,
    },
    Dashboard,
    Employees {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Show one employee record.
    Employee { id: i64 },
    EmployeeAdd {
        /// Fixed once the record exists.
        #[arg(long)]
        employee_id: Option<String>,
        #[command(flatten)]
        fields: DraftArgs,
    },
    EmployeeEdit {
        id: i64,
        #[command(flatten)]
        changes: DraftArgs,
    },
    EmployeeDelete { id: i64 },
    Payroll {
        #[command(flatten)]
        period: Period,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Employees that have no run in the period yet.
    PayrollAvailable {
        #[command(flatten)]
        period: Period,
    },
    PayrollCreate {
        #[command(flatten)]
        period: Period,
        #[arg(long)]
        employee_id: Option<i64>,
        #[arg(long, default_value_t = 0.0)]
        deductions: f64,
    },
    PayrollProcess {
        #[command(flatten)]
        period: Period,
        id: i64,
    },
    PayrollBulk {
        #[command(flatten)]
        period: Period,
        #[arg(long, default_value_t = 0.0)]
        deductions: f64,
    },
    Payslips {
        #[arg(long, default_value = "")]
        search: String,
    },
    PayslipDownload {
        id: i64,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    Analytics,
}

#[derive(Debug, Args)]
struct Period {
    /// Defaults to the current month.
    #[arg(long)]
    month: Option<u32>,
    #[arg(long)]
    year: Option<i32>,
}

impl Period {
    fn resolve(&self, today: NaiveDate) -> (u32, i32) {
        (
            self.month.unwrap_or(today.month()),
            self.year.unwrap_or(today.year()),
        )
    }
}

/// Editable employee fields; unset flags leave the draft unchanged.
#[derive(Debug, Args)]
struct DraftArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    date_of_birth: Option<NaiveDate>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    position: Option<String>,
    #[arg(long)]
    basic_salary: Option<f64>,
    #[arg(long)]
    hire_date: Option<NaiveDate>,
    #[arg(long)]
    employment_type: Option<String>,
    #[arg(long)]
    emergency_contact_name: Option<String>,
    #[arg(long)]
    emergency_contact_phone: Option<String>,
    #[arg(long)]
    emergency_contact_relationship: Option<String>,
    #[arg(long)]
    bank_name: Option<String>,
    #[arg(long)]
    bank_account: Option<String>,
}

impl DraftArgs {
    fn apply(self, d: &mut EmployeeDraft) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        set(&mut d.name, self.name);
        set(&mut d.email, self.email);
        set(&mut d.phone, self.phone);
        set(&mut d.date_of_birth, self.date_of_birth.map(Some));
        set(&mut d.gender, self.gender);
        set(&mut d.address, self.address);
        set(&mut d.department, self.department);
        set(&mut d.position, self.position);
        set(&mut d.basic_salary, self.basic_salary);
        set(&mut d.hire_date, self.hire_date.map(Some));
        set(&mut d.employment_type, self.employment_type);
        set(&mut d.emergency_contact_name, self.emergency_contact_name);
        set(&mut d.emergency_contact_phone, self.emergency_contact_phone);
        set(
            &mut d.emergency_contact_relationship,
            self.emergency_contact_relationship,
        );
        set(&mut d.bank_name, self.bank_name);
        set(&mut d.bank_account, self.bank_account);
    }
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice {
            Notice::Success(m) => println!("✓ {m}"),
            Notice::Error(m) => eprintln!("✗ {m}"),
        }
    }
}

/// Report a redirect the way a browser would follow it.
fn redirected(r: Redirect) -> Result<()> {
    if let Some(notice) = &r.notice {
        print_notices(std::slice::from_ref(notice));
    }
    match r.to {
        Navigation::Login => bail!("Not signed in. Run `payroll-console login` first."),
        Navigation::Dashboard => bail!("Returning to the dashboard."),
        Navigation::Employees => bail!("Run `payroll-console employees` to pick another."),
    }
}

macro_rules! page {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(r) => return redirected(r),
        }
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api = ApiClient::new(HyperTransport::new(&cli.gateway));
    let mut session = SessionStore::open(FileStorage::new(&cli.session_file))
        .with_context(|| format!("Failed to open session {}", cli.session_file.display()))?;
    let today = Local::now().date_naive();

    match cli.command {
        Command::Login { email, password } => {
            let login = api
                .login(&LoginData { email, password })
                .await
                .context("Login failed")?;
            session.sign_in(login).context("Failed to store session")?;
            if let Some(user) = session.user() {
                println!("Signed in as {user}");
            }
        }

        Command::Register {
            email,
            password,
            role,
            name,
            employee_id,
            department,
        } => {
            let role = Role::parse(&role);
            let employee = match (name, employee_id) {
                (Some(name), Some(employee_id)) if role != Role::Admin => Some(SessionEmployee {
                    name,
                    department,
                    employee_id,
                }),
                _ => None,
            };
            let reply = api
                .register(&RegistrationData {
                    email,
                    password,
                    role,
                    employee,
                })
                .await
                .context("Registration failed")?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }

        Command::Logout => {
            session.clear().context("Failed to clear session")?;
            println!("Signed out");
        }

        Command::Whoami => {
            let token = page!(session.require_token().map_err(Redirect::from));
            match api.me(&token).await {
                Ok(me) => println!("{}", serde_json::to_string_pretty(&me)?),
                Err(e) if e.is_unauthorized() => return redirected(session.invalidate().into()),
                Err(e) => return Err(e).context("Failed to load profile"),
            }
        }

        Command::Page { path, cookie_name } => {
            let answer = api
                .fetch_page(&path, session.cookie_header(&cookie_name))
                .await
                .context("Page request failed")?;
            match answer.location {
                Some(location) => println!("{} -> {}", answer.status, location),
                None => println!("{}", answer.status),
            }
        }

        Command::Dashboard => {
            let dash = page!(DashboardPage::load(&mut session, &api).await);
            println!("Welcome, {}", dash.user);
            if let Some(emp) = &dash.employee {
                println!("Employee {} ({})", emp.name, emp.employee_id);
            }
            let nav: Vec<_> = dash.nav.iter().map(|n| n.label).collect();
            println!("Pages: {}", nav.join(" | "));
            let s = &dash.summary;
            println!("Employees:      {}", s.total_employees);
            println!("Total payroll:  {:.2}", s.total_payroll);
            println!("Payslips:       {}", s.total_payslips);
            println!("Average salary: {:.2}", s.average_salary);
            print_notices(&dash.notices);
        }

        Command::Employees { search } => {
            let list = page!(EmployeesPage::load(&mut session, &api).await);
            for e in list.visible(&search) {
                println!(
                    "{:>5}  {:<10} {:<24} {:<28} {}",
                    e.id,
                    e.employee_id,
                    e.name,
                    e.email,
                    e.department.as_deref().unwrap_or("-")
                );
            }
            print_notices(&list.notices);
        }

        Command::Employee { id } => {
            let detail = page!(EmployeePage::load(&mut session, &api, id).await);
            let e = &detail.employee;
            println!("{} ({})", e.name, e.employee_id);
            println!("Email:       {}", e.email);
            println!("Department:  {}", e.department.as_deref().unwrap_or("-"));
            println!("Position:    {}", e.position.as_deref().unwrap_or("-"));
            if let Some(salary) = e.basic_salary {
                println!("Salary:      {salary:.2}");
            }
            if detail.can_edit {
                println!("Edit with `payroll-console employee-edit {}`", e.id);
            }
        }

        Command::EmployeeAdd {
            employee_id,
            fields,
        } => {
            let list = page!(EmployeesPage::load(&mut session, &api).await);
            let mut form = EmployeeForm::create(list.options.clone());
            if let Some(employee_id) = employee_id {
                form.draft.employee_id = employee_id;
            }
            fields.apply(&mut form.draft);
            submit(&mut form, &mut session, &api, today).await?;
        }

        Command::EmployeeEdit { id, changes } => {
            let mut form = match page!(EmployeeForm::load_for_edit(&mut session, &api, id).await) {
                Ok(form) => form,
                Err(notice) => {
                    print_notices(&[notice]);
                    bail!("Cannot edit employee {id}");
                }
            };
            print_notices(&form.notices);
            changes.apply(&mut form.draft);
            submit(&mut form, &mut session, &api, today).await?;
        }

        Command::EmployeeDelete { id } => {
            let mut list = page!(EmployeesPage::load(&mut session, &api).await);
            page!(list.delete(&mut session, &api, id).await);
            print_notices(&list.notices);
        }

        Command::Payroll { period, search } => {
            let (month, year) = period.resolve(today);
            let payroll = page!(PayrollPage::load(&mut session, &api, month, year).await);
            println!("Payroll runs for {month:02}/{year}");
            for r in payroll.visible(&search) {
                println!(
                    "{:>5}  {:<24} basic {:>10.2}  deductions {:>9.2}  net {:>10.2}  {:?}",
                    r.id,
                    r.employee_name.as_deref().unwrap_or("-"),
                    r.basic_salary,
                    r.deductions,
                    r.net_salary,
                    r.status
                );
            }
            print_notices(&payroll.notices);
        }

        Command::PayrollAvailable { period } => {
            let (month, year) = period.resolve(today);
            let payroll = page!(PayrollPage::load(&mut session, &api, month, year).await);
            for e in payroll.available() {
                println!("{:>5}  {:<10} {}", e.id, e.employee_id, e.name);
            }
            print_notices(&payroll.notices);
        }

        Command::PayrollCreate {
            period,
            employee_id,
            deductions,
        } => {
            let (month, year) = period.resolve(today);
            let mut payroll = page!(PayrollPage::load(&mut session, &api, month, year).await);
            page!(
                payroll
                    .create_run(&mut session, &api, employee_id, deductions)
                    .await
            );
            print_notices(&payroll.notices);
        }

        Command::PayrollProcess { period, id } => {
            let (month, year) = period.resolve(today);
            let mut payroll = page!(PayrollPage::load(&mut session, &api, month, year).await);
            page!(payroll.process(&mut session, &api, id).await);
            print_notices(&payroll.notices);
        }

        Command::PayrollBulk { period, deductions } => {
            let (month, year) = period.resolve(today);
            let mut payroll = page!(PayrollPage::load(&mut session, &api, month, year).await);
            page!(payroll.bulk_create(&mut session, &api, deductions).await);
            print_notices(&payroll.notices);
        }

        Command::Payslips { search } => {
            let slips = page!(PayslipsPage::load(&mut session, &api).await);
            if !slips.all_employees {
                println!("Showing your payslips");
            }
            for p in slips.visible(&search) {
                println!(
                    "{:>5}  {:<24} gross {:>10.2}  tax {:>9.2}  net {:>10.2}  {:?}",
                    p.id,
                    p.employee_name.as_deref().unwrap_or("-"),
                    p.gross_salary,
                    p.tax,
                    p.net_salary,
                    p.payment_status
                );
            }
            print_notices(&slips.notices);
        }

        Command::PayslipDownload { id, out } => {
            let mut slips = page!(PayslipsPage::load(&mut session, &api).await);
            if let Some(path) = page!(slips.download(&mut session, &api, id, &out).await) {
                println!("{}", path.display());
            }
            print_notices(&slips.notices);
        }

        Command::Analytics => {
            let analytics = page!(AnalyticsPage::load(&mut session, &api).await);
            println!("By department");
            for d in &analytics.departments {
                println!(
                    "  {:<20} {:>4} employees  {:>12.2}",
                    d.department, d.employee_count, d.total_salary
                );
            }
            println!("Monthly trend");
            for t in &analytics.trends {
                println!(
                    "  {:02}/{}  {:>12.2}  ({} payslips)",
                    t.month, t.year, t.total_payroll, t.employee_count
                );
            }
            print_notices(&analytics.notices);
        }
    }

    Ok(())
}

async fn submit(
    form: &mut EmployeeForm,
    session: &mut SessionStore<FileStorage>,
    api: &ApiClient<HyperTransport>,
    today: NaiveDate,
) -> Result<()> {
    if page!(form.submit(session, api, today).await) {
        println!("Employee saved");
        return Ok(());
    }
    for error in &form.errors {
        eprintln!("✗ {error}");
    }
    bail!("Employee not saved")
}
