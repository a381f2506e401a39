//! Sample data for demos and local development.

use libsql::Value;

use crate::db::libsql::{LibSqlBackend, execute_on, query_first};
use crate::db::{UserRole, hash_password};
use crate::error::DatabaseError;

/// Password shared by every sample account.
pub const SAMPLE_PASSWORD: &str = "password123";

/// Rows inserted by [`seed_sample_data`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub clients: usize,
    pub cases: usize,
}

struct SampleUser {
    email: &'static str,
    name: &'static str,
    role: UserRole,
}

struct SampleClient {
    email: &'static str,
    phone: &'static str,
    address: &'static str,
    birth_date: &'static str,
    nationality: &'static str,
    immigration_status: &'static str,
    notes: &'static str,
}

struct SampleCase {
    client_email: &'static str,
    case_number: &'static str,
    title: &'static str,
    description: &'static str,
    case_type: &'static str,
    status: &'static str,
    priority: &'static str,
    start_date: &'static str,
    due_date: &'static str,
}

const LAWYER_EMAIL: &str = "abogado@nolivoslaw.com";
const PARALEGAL_EMAIL: &str = "paralegal@nolivoslaw.com";

const USERS: &[SampleUser] = &[
    SampleUser {
        email: "admin@nolivoslaw.com",
        name: "Admin Usuario",
        role: UserRole::Admin,
    },
    SampleUser {
        email: LAWYER_EMAIL,
        name: "Carlos Rodríguez",
        role: UserRole::Lawyer,
    },
    SampleUser {
        email: PARALEGAL_EMAIL,
        name: "Maria Gómez",
        role: UserRole::Paralegal,
    },
    SampleUser {
        email: "cliente1@example.com",
        name: "Juan Pérez",
        role: UserRole::Client,
    },
    SampleUser {
        email: "cliente2@example.com",
        name: "Ana Martínez",
        role: UserRole::Client,
    },
];

const CLIENTS: &[SampleClient] = &[
    SampleClient {
        email: "cliente1@example.com",
        phone: "+1 555-123-4567",
        address: "123 Main St, Anytown, USA",
        birth_date: "1985-04-15",
        nationality: "Mexicana",
        immigration_status: "Visa de trabajo",
        notes: "Cliente busca renovar su visa de trabajo",
    },
    SampleClient {
        email: "cliente2@example.com",
        phone: "+1 555-987-6543",
        address: "456 Oak Ave, Somewhere, USA",
        birth_date: "1990-10-22",
        nationality: "Colombiana",
        immigration_status: "Asilo pendiente",
        notes: "Cliente en proceso de solicitud de asilo político",
    },
];

const CASES: &[SampleCase] = &[
    SampleCase {
        client_email: "cliente1@example.com",
        case_number: "CASE-2025-001",
        title: "Renovación de Visa de Trabajo",
        description: "Cliente necesita renovar su visa de trabajo H-1B",
        case_type: "Visa de trabajo",
        status: "en progreso",
        priority: "alta",
        start_date: "2025-01-15",
        due_date: "2025-04-15",
    },
    SampleCase {
        client_email: "cliente2@example.com",
        case_number: "CASE-2025-002",
        title: "Solicitud de Asilo Político",
        description: "Cliente solicita asilo debido a persecución política",
        case_type: "Asilo",
        status: "pendiente revisión",
        priority: "media",
        start_date: "2025-02-10",
        due_date: "2025-06-10",
    },
];

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

async fn id_for_email(conn: &libsql::Connection, email: &str) -> Result<i64, DatabaseError> {
    query_first(conn, "SELECT id FROM users WHERE email = ?1", vec![text(email)])
        .await?
        .and_then(|row| row.get("id").and_then(serde_json::Value::as_i64))
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "user",
            id: email.to_string(),
        })
}

/// Insert the sample firm: five users, two client profiles and two cases,
/// all in one transaction. Does nothing when any user already exists.
pub async fn seed_sample_data(backend: &LibSqlBackend) -> Result<SeedReport, DatabaseError> {
    let report = backend
        .transaction(|conn| {
            Box::pin(async move {
                let existing = query_first(conn, "SELECT COUNT(*) AS n FROM users", vec![])
                    .await?
                    .and_then(|row| row.get("n").and_then(serde_json::Value::as_i64))
                    .unwrap_or(0);
                if existing > 0 {
                    return Ok(SeedReport::default());
                }

                let mut report = SeedReport::default();
                let password_hash = hash_password(SAMPLE_PASSWORD);
                for user in USERS {
                    execute_on(
                        conn,
                        "INSERT INTO users (email, password_hash, name, role) VALUES (?1, ?2, ?3, ?4)",
                        vec![
                            text(user.email),
                            text(&password_hash),
                            text(user.name),
                            text(user.role.as_str()),
                        ],
                    )
                    .await?;
                    report.users += 1;
                }

                for client in CLIENTS {
                    let user_id = id_for_email(conn, client.email).await?;
                    execute_on(
                        conn,
                        "INSERT INTO clients (user_id, phone, address, birth_date, nationality, immigration_status, notes) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        vec![
                            Value::Integer(user_id),
                            text(client.phone),
                            text(client.address),
                            text(client.birth_date),
                            text(client.nationality),
                            text(client.immigration_status),
                            text(client.notes),
                        ],
                    )
                    .await?;
                    report.clients += 1;
                }

                let lawyer_id = id_for_email(conn, LAWYER_EMAIL).await?;
                let paralegal_id = id_for_email(conn, PARALEGAL_EMAIL).await?;
                for case in CASES {
                    let user_id = id_for_email(conn, case.client_email).await?;
                    let client_id = query_first(
                        conn,
                        "SELECT id FROM clients WHERE user_id = ?1",
                        vec![Value::Integer(user_id)],
                    )
                    .await?
                    .and_then(|row| row.get("id").and_then(serde_json::Value::as_i64))
                    .ok_or_else(|| DatabaseError::NotFound {
                        entity: "client",
                        id: case.client_email.to_string(),
                    })?;
                    execute_on(
                        conn,
                        "INSERT INTO cases (client_id, lawyer_id, paralegal_id, case_number, title, description, \
                         case_type, status, priority, start_date, due_date) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        vec![
                            Value::Integer(client_id),
                            Value::Integer(lawyer_id),
                            Value::Integer(paralegal_id),
                            text(case.case_number),
                            text(case.title),
                            text(case.description),
                            text(case.case_type),
                            text(case.status),
                            text(case.priority),
                            text(case.start_date),
                            text(case.due_date),
                        ],
                    )
                    .await?;
                    report.cases += 1;
                }

                Ok(report)
            })
        })
        .await?;

    if report.users > 0 {
        tracing::info!(
            users = report.users,
            clients = report.clients,
            cases = report.cases,
            "seeded sample portal data"
        );
    } else {
        tracing::info!("database already has users; skipping sample data");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::{CaseStore, ClientStore, Database, UserStore};

    async fn setup() -> (LibSqlBackend, tempfile::TempDir) {
        let tmpdir = tempfile::tempdir().expect("tempdir");
        let backend = LibSqlBackend::new_local(&tmpdir.path().join("seed.db"))
            .await
            .expect("open");
        backend.run_migrations().await.expect("migrate");
        (backend, tmpdir)
    }

    #[tokio::test]
    async fn seed_inserts_sample_firm_once() {
        let (backend, _tmp) = setup().await;

        let first = seed_sample_data(&backend).await.expect("seed");
        assert_eq!(
            first,
            SeedReport {
                users: 5,
                clients: 2,
                cases: 2
            }
        );

        let second = seed_sample_data(&backend).await.expect("reseed");
        assert_eq!(second, SeedReport::default());
        assert_eq!(backend.list_users().await.expect("users").len(), 5);
    }

    #[tokio::test]
    async fn seeded_accounts_log_in_and_see_their_cases() {
        let (backend, _tmp) = setup().await;
        seed_sample_data(&backend).await.expect("seed");

        let lawyer = backend
            .verify_credentials(LAWYER_EMAIL, SAMPLE_PASSWORD)
            .await
            .expect("verify")
            .expect("lawyer logs in");
        assert_eq!(lawyer.name, "Carlos Rodríguez");

        let cases = backend
            .list_cases_for_staff(lawyer.id, UserRole::Lawyer)
            .await
            .expect("cases");
        let mut numbers: Vec<_> = cases
            .iter()
            .filter_map(|c| c.case_number.clone())
            .collect();
        numbers.sort();
        assert_eq!(numbers, vec!["CASE-2025-001", "CASE-2025-002"]);

        let juan = backend
            .get_user_by_email("cliente1@example.com")
            .await
            .expect("lookup")
            .expect("juan");
        let profile = backend
            .get_client_by_user(juan.id)
            .await
            .expect("profile")
            .expect("juan has a profile");
        assert_eq!(profile.nationality.as_deref(), Some("Mexicana"));
        let own = backend
            .list_cases_for_client(profile.id)
            .await
            .expect("client cases");
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].status, "en progreso");
        assert_eq!(own[0].priority.as_deref(), Some("alta"));
    }
}
