//! Per-role dashboard data, read from the portal database.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::{
    CaseDocumentRecord, CaseDocumentStore, CaseEventRecord, CaseEventStore, CaseRecord, CaseStore,
    ClientRecord, ClientStore, Database, UserRecord, UserRole, UserStore,
};
use crate::error::DatabaseError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FirmStats {
    pub users: usize,
    pub lawyers: usize,
    pub paralegals: usize,
    pub clients: usize,
    pub cases: usize,
}

/// A case with the records a client sees beside it.
#[derive(Debug, Clone, Serialize)]
pub struct CaseDetail {
    #[serde(flatten)]
    pub case: CaseRecord,
    pub documents: Vec<CaseDocumentRecord>,
    pub events: Vec<CaseEventRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DashboardView {
    Admin {
        user: UserRecord,
        stats: FirmStats,
        cases: Vec<CaseRecord>,
    },
    Lawyer {
        user: UserRecord,
        cases: Vec<CaseRecord>,
        upcoming_events: Vec<CaseEventRecord>,
    },
    Paralegal {
        user: UserRecord,
        cases: Vec<CaseRecord>,
        pending_documents: Vec<CaseDocumentRecord>,
    },
    Client {
        user: UserRecord,
        profile: Option<ClientRecord>,
        cases: Vec<CaseDetail>,
    },
}

impl DashboardView {
    pub fn role(&self) -> UserRole {
        match self {
            Self::Admin { .. } => UserRole::Admin,
            Self::Lawyer { .. } => UserRole::Lawyer,
            Self::Paralegal { .. } => UserRole::Paralegal,
            Self::Client { .. } => UserRole::Client,
        }
    }
}

/// Assemble the dashboard for `user`. Events before `as_of` or no longer
/// marked `upcoming` are left out of the lawyer view.
pub async fn build_dashboard(
    store: &dyn Database,
    user: &UserRecord,
    as_of: NaiveDateTime,
) -> Result<DashboardView, DatabaseError> {
    let user = user.clone();
    match user.role {
        UserRole::Admin => {
            let users = store.list_users().await?;
            let clients = store.list_clients().await?;
            let cases = store.list_cases().await?;
            let stats = FirmStats {
                users: users.len(),
                lawyers: users.iter().filter(|u| u.role == UserRole::Lawyer).count(),
                paralegals: users
                    .iter()
                    .filter(|u| u.role == UserRole::Paralegal)
                    .count(),
                clients: clients.len(),
                cases: cases.len(),
            };
            Ok(DashboardView::Admin { user, stats, cases })
        }
        UserRole::Lawyer => {
            let cases = store.list_cases_for_staff(user.id, UserRole::Lawyer).await?;
            let mut upcoming_events = Vec::new();
            for case in &cases {
                upcoming_events.extend(
                    store
                        .list_case_events(case.id)
                        .await?
                        .into_iter()
                        .filter(|e| e.status == "upcoming" && e.event_date >= as_of),
                );
            }
            upcoming_events.sort_by(|a, b| a.event_date.cmp(&b.event_date).then(a.id.cmp(&b.id)));
            Ok(DashboardView::Lawyer {
                user,
                cases,
                upcoming_events,
            })
        }
        UserRole::Paralegal => {
            let cases = store
                .list_cases_for_staff(user.id, UserRole::Paralegal)
                .await?;
            let mut pending_documents = Vec::new();
            for case in &cases {
                pending_documents.extend(
                    store
                        .list_case_documents(case.id)
                        .await?
                        .into_iter()
                        .filter(|d| d.status == "pending"),
                );
            }
            Ok(DashboardView::Paralegal {
                user,
                cases,
                pending_documents,
            })
        }
        UserRole::Client => {
            let profile = store.get_client_by_user(user.id).await?;
            let mut cases = Vec::new();
            if let Some(profile) = &profile {
                for case in store.list_cases_for_client(profile.id).await? {
                    let documents = store.list_case_documents(case.id).await?;
                    let events = store.list_case_events(case.id).await?;
                    cases.push(CaseDetail {
                        case,
                        documents,
                        events,
                    });
                }
            }
            Ok(DashboardView::Client {
                user,
                profile,
                cases,
            })
        }
    }
}
