use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use groupware_core::approvals::{
    self, Decision, SubmissionPlan, WorkflowError, CASCADE_REJECT_COMMENT,
};
use groupware_core::domain::approval::{
    ApprovalDetail, ApprovalHistoryEntry, ApprovalId, ApprovalLine, ApprovalListFilter,
    ApprovalRequest, ApprovalStatus, DocumentRef, DocumentType, HistoryAction, LineStatus,
};
use groupware_core::numbering::DocumentKind;

use super::rows::{self, col, now_text, opt_timestamp, parsed, timestamp};
use super::{ApprovalReceipt, ApprovalRepository, Page, RepositoryError};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "r.id, r.doc_type, r.doc_id, r.approval_doc_number, r.task_name, r.title,
     r.content, r.unty_file_no, r.status, r.requester_id, r.requested_at,
     r.final_approver_id, r.final_approval_date";

const CLOSED_STATUSES: &str = "('APPROVED', 'REJECTED', 'CANCELLED')";

pub struct SqlApprovalRepository {
    pool: DbPool,
}

impl SqlApprovalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_request(row: &SqliteRow) -> Result<ApprovalRequest, RepositoryError> {
    let doc_type: DocumentType = parsed(row, "doc_type")?;
    let doc_id: i64 = col(row, "doc_id")?;

    Ok(ApprovalRequest {
        id: ApprovalId(col(row, "id")?),
        document: DocumentRef::new(doc_type, doc_id),
        doc_number: col(row, "approval_doc_number")?,
        task_name: col(row, "task_name")?,
        title: col(row, "title")?,
        content: col(row, "content")?,
        unty_file_no: col(row, "unty_file_no")?,
        status: parsed(row, "status")?,
        requester_id: col(row, "requester_id")?,
        requested_at: timestamp(row, "requested_at")?,
        final_approver_id: col(row, "final_approver_id")?,
        final_approval_date: opt_timestamp(row, "final_approval_date")?,
    })
}

fn row_to_line(row: &SqliteRow) -> Result<ApprovalLine, RepositoryError> {
    let line_order: i64 = col(row, "line_order")?;
    Ok(ApprovalLine {
        id: col(row, "id")?,
        approval_id: ApprovalId(col(row, "approval_id")?),
        approver_id: col(row, "approver_id")?,
        line_order: u32::try_from(line_order)
            .map_err(|_| RepositoryError::Decode(format!("line_order: {line_order}")))?,
        status: parsed(row, "status")?,
        comment: col(row, "comment")?,
        decided_at: opt_timestamp(row, "decided_at")?,
    })
}

fn row_to_history(row: &SqliteRow) -> Result<ApprovalHistoryEntry, RepositoryError> {
    Ok(ApprovalHistoryEntry {
        id: col(row, "id")?,
        approval_id: ApprovalId(col(row, "approval_id")?),
        actor_id: col(row, "actor_id")?,
        action: parsed(row, "action")?,
        comment: col(row, "comment")?,
        action_date: timestamp(row, "action_date")?,
    })
}

async fn load_request(
    conn: &mut SqliteConnection,
    approval_id: ApprovalId,
) -> Result<ApprovalRequest, RepositoryError> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM approval_request r WHERE r.id = ?");
    let row = sqlx::query(&sql).bind(approval_id.0).fetch_optional(&mut *conn).await?;
    match row {
        Some(ref row) => row_to_request(row),
        None => Err(RepositoryError::not_found("approval", approval_id)),
    }
}

async fn load_lines(
    conn: &mut SqliteConnection,
    approval_id: ApprovalId,
) -> Result<Vec<ApprovalLine>, RepositoryError> {
    sqlx::query(
        "SELECT id, approval_id, approver_id, line_order, status, comment, decided_at
         FROM approval_line WHERE approval_id = ? ORDER BY id ASC",
    )
    .bind(approval_id.0)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(row_to_line)
    .collect()
}

async fn append_history(
    conn: &mut SqliteConnection,
    approval_id: ApprovalId,
    actor_id: Option<i64>,
    action: HistoryAction,
    comment: &str,
    at: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO approval_history (approval_id, actor_id, action, comment, action_date)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(approval_id.0)
    .bind(actor_id)
    .bind(action.as_str())
    .bind(comment)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn ensure_document(
    conn: &mut SqliteConnection,
    document: DocumentRef,
) -> Result<(), RepositoryError> {
    let (table, entity) = match document {
        DocumentRef::Estimate(_) => ("estimate", "estimate"),
        DocumentRef::Contract(_) => ("contract", "contract"),
    };
    if rows::row_exists(conn, table, "id", document.doc_id()).await? {
        Ok(())
    } else {
        Err(RepositoryError::not_found(entity, document.doc_id()))
    }
}

async fn ensure_users(conn: &mut SqliteConnection, ids: &[i64]) -> Result<(), RepositoryError> {
    for id in ids {
        if !rows::row_exists(conn, "users", "id", *id).await? {
            return Err(RepositoryError::not_found("user", id));
        }
    }
    Ok(())
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ApprovalListFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        builder.push(" AND r.status = ").push_bind(status.as_str());
    }
    if let Some(requester_id) = filter.requester_id {
        builder.push(" AND r.requester_id = ").push_bind(requester_id);
    }
    if let Some(approver_id) = filter.approver_id {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM approval_line l WHERE l.approval_id = r.id AND l.approver_id = ",
            )
            .push_bind(approver_id)
            .push(")");
    }
}

#[async_trait]
impl ApprovalRepository for SqlApprovalRepository {
    async fn submit(&self, plan: SubmissionPlan) -> Result<ApprovalReceipt, RepositoryError> {
        let mut tx = rows::begin_write(&self.pool).await?;

        ensure_document(&mut tx, plan.document).await?;
        let mut people = vec![plan.requester_id];
        people.extend(plan.lines.iter().map(|line| line.approver_id));
        ensure_users(&mut tx, &people).await?;

        let now = now_text();
        let doc_number = rows::next_document_number(
            &mut tx,
            DocumentKind::Approval,
            "approval_request",
            "approval_doc_number",
        )
        .await?;

        let approval_id = ApprovalId(
            sqlx::query(
                "INSERT INTO approval_request (
                    doc_type, doc_id, approval_doc_number, task_name, title, content,
                    unty_file_no, status, requester_id, requested_at, updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(plan.document.doc_type().as_str())
            .bind(plan.document.doc_id())
            .bind(&doc_number)
            .bind(&plan.task_name)
            .bind(&plan.title)
            .bind(&plan.content)
            .bind(&plan.unty_file_no)
            .bind(plan.status.as_str())
            .bind(plan.requester_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        );

        for line in &plan.lines {
            sqlx::query(
                "INSERT INTO approval_line (approval_id, approver_id, line_order, status)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(approval_id.0)
            .bind(line.approver_id)
            .bind(i64::from(line.line_order))
            .bind(LineStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;
        }

        append_history(
            &mut tx,
            approval_id,
            Some(plan.requester_id),
            HistoryAction::Request,
            plan.content.as_deref().unwrap_or_default(),
            &now,
        )
        .await?;

        if let DocumentRef::Contract(contract_id) = plan.document {
            sqlx::query("UPDATE contract SET approval_id = ?, updated_at = ? WHERE id = ?")
                .bind(approval_id.0)
                .bind(&now)
                .bind(contract_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(ApprovalReceipt { approval_id, doc_number })
    }

    async fn process(
        &self,
        approval_id: ApprovalId,
        approver_id: i64,
        decision: Decision,
        comment: &str,
    ) -> Result<ApprovalStatus, RepositoryError> {
        let mut tx = rows::begin_write(&self.pool).await?;

        let request = load_request(&mut tx, approval_id).await?;
        let lines = load_lines(&mut tx, approval_id).await?;
        let outcome = approvals::decide(&request, &lines, approver_id, decision)?;
        let now = now_text();

        // Guarded on PENDING so a concurrent decision on the same line loses.
        let claimed = sqlx::query(
            "UPDATE approval_line SET status = ?, comment = ?, decided_at = ?
             WHERE id = ? AND status = 'PENDING'",
        )
        .bind(outcome.line_status.as_str())
        .bind(comment)
        .bind(&now)
        .bind(outcome.line_id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            return Err(WorkflowError::NoActiveLine { approver_id }.into());
        }

        for line_id in &outcome.cascaded_line_ids {
            sqlx::query(
                "UPDATE approval_line SET status = 'REJECTED', comment = ?, decided_at = ?
                 WHERE id = ? AND status = 'PENDING'",
            )
            .bind(CASCADE_REJECT_COMMENT)
            .bind(&now)
            .bind(line_id)
            .execute(&mut *tx)
            .await?;
        }

        let final_date = outcome.is_final().then(|| now.clone());
        let sql = format!(
            "UPDATE approval_request
             SET status = ?, final_approver_id = COALESCE(?, final_approver_id),
                 final_approval_date = COALESCE(?, final_approval_date), updated_at = ?
             WHERE id = ? AND status NOT IN {CLOSED_STATUSES}"
        );
        let updated = sqlx::query(&sql)
            .bind(outcome.request_status.as_str())
            .bind(outcome.final_approver_id)
            .bind(final_date)
            .bind(&now)
            .bind(approval_id.0)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(WorkflowError::RequestClosed { status: request.status }.into());
        }

        append_history(&mut tx, approval_id, Some(approver_id), outcome.history_action, comment, &now)
            .await?;

        tx.commit().await?;
        Ok(outcome.request_status)
    }

    async fn cancel(
        &self,
        approval_id: ApprovalId,
        actor_id: i64,
        comment: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = rows::begin_write(&self.pool).await?;

        let request = load_request(&mut tx, approval_id).await?;
        approvals::plan_cancel(&request, actor_id)?;
        let now = now_text();

        let sql = format!(
            "UPDATE approval_request SET status = 'CANCELLED', updated_at = ?
             WHERE id = ? AND status NOT IN {CLOSED_STATUSES}"
        );
        let updated = sqlx::query(&sql).bind(&now).bind(approval_id.0).execute(&mut *tx).await?;
        if updated.rows_affected() == 0 {
            return Err(WorkflowError::NotCancellable { status: request.status }.into());
        }

        sqlx::query("UPDATE approval_line SET status = 'CANCELLED' WHERE approval_id = ?")
            .bind(approval_id.0)
            .execute(&mut *tx)
            .await?;

        append_history(&mut tx, approval_id, Some(actor_id), HistoryAction::Cancel, comment, &now)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_status(
        &self,
        approval_id: ApprovalId,
        status: ApprovalStatus,
        actor_id: Option<i64>,
        comment: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = rows::begin_write(&self.pool).await?;

        let request = load_request(&mut tx, approval_id).await?;
        let plan = approvals::plan_status_update(&request, status)?;
        let now = now_text();

        let sql = format!(
            "UPDATE approval_request SET status = ?, updated_at = ?
             WHERE id = ? AND status NOT IN {CLOSED_STATUSES}"
        );
        let updated = sqlx::query(&sql)
            .bind(plan.status.as_str())
            .bind(&now)
            .bind(approval_id.0)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(WorkflowError::RequestClosed { status: request.status }.into());
        }

        if let Some(action) = plan.history_action {
            append_history(&mut tx, approval_id, actor_id, action, comment, &now).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_detail(
        &self,
        approval_id: ApprovalId,
    ) -> Result<Option<ApprovalDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let request = match load_request(&mut conn, approval_id).await {
            Ok(request) => request,
            Err(RepositoryError::NotFound { .. }) => return Ok(None),
            Err(error) => return Err(error),
        };
        let lines = load_lines(&mut conn, approval_id).await?;
        let history = sqlx::query(
            "SELECT id, approval_id, actor_id, action, comment, action_date
             FROM approval_history WHERE approval_id = ? ORDER BY id ASC",
        )
        .bind(approval_id.0)
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(row_to_history)
        .collect::<Result<Vec<_>, _>>()?;

        let latest_reject_comment = history
            .iter()
            .rev()
            .find(|entry| entry.action == HistoryAction::Reject)
            .map(|entry| entry.comment.clone());

        Ok(Some(ApprovalDetail { request, lines, history, latest_reject_comment }))
    }

    async fn list(
        &self,
        filter: &ApprovalListFilter,
        page: Page,
    ) -> Result<(Vec<ApprovalRequest>, i64), RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {REQUEST_COLUMNS} FROM approval_request r"
        ));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY r.requested_at DESC, r.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = query
            .build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_request)
            .collect::<Result<Vec<_>, _>>()?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM approval_request r");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use groupware_core::approvals::{
        plan_submission, Decision, SubmissionInput, WorkflowError, CASCADE_REJECT_COMMENT,
    };
    use groupware_core::domain::approval::{
        ApprovalId, ApprovalListFilter, ApprovalStatus, DocumentRef, HistoryAction, LineStatus,
    };
    use groupware_core::errors::{DomainError, ErrorClass};

    use super::SqlApprovalRepository;
    use crate::repositories::test_support::{insert_customer, insert_estimate, insert_user, pool};
    use crate::repositories::{ApprovalRepository, Page, RepositoryError};
    use crate::DbPool;

    struct Fixture {
        pool: DbPool,
        repo: SqlApprovalRepository,
        requester: i64,
        a: i64,
        b: i64,
        estimate_id: i64,
    }

    async fn fixture() -> Fixture {
        let pool = pool().await;
        let requester = insert_user(&pool, "requester", "USER").await;
        let a = insert_user(&pool, "approver-a", "USER").await;
        let b = insert_user(&pool, "approver-b", "USER").await;
        let customer = insert_customer(&pool, "Acme").await;
        let estimate_id = insert_estimate(&pool, customer, "ITS-20240101-001").await;
        let repo = SqlApprovalRepository::new(pool.clone());
        Fixture { pool, repo, requester, a, b, estimate_id }
    }

    impl Fixture {
        async fn submit(&self, approvers: Vec<i64>) -> ApprovalId {
            let plan = plan_submission(SubmissionInput {
                document: DocumentRef::Estimate(self.estimate_id),
                title: "Please review".to_string(),
                content: Some("quote for Acme".to_string()),
                task_name: None,
                unty_file_no: None,
                requester_id: self.requester,
                approvers,
            })
            .expect("plan");
            self.repo.submit(plan).await.expect("submit").approval_id
        }

        async fn history_count(&self, id: ApprovalId) -> i64 {
            sqlx::query_scalar("SELECT COUNT(*) FROM approval_history WHERE approval_id = ?")
                .bind(id.0)
                .fetch_one(&self.pool)
                .await
                .expect("count history")
        }
    }

    #[tokio::test]
    async fn submit_creates_request_lines_and_request_history() {
        let fx = fixture().await;
        let id = fx.submit(vec![fx.a, fx.b]).await;

        let detail = fx.repo.find_detail(id).await.expect("detail").expect("exists");
        assert_eq!(detail.request.status, ApprovalStatus::Requesting);
        assert!(detail.request.doc_number.starts_with("APP-"));
        assert!(detail.request.doc_number.ends_with("-0001"));
        let orders: Vec<u32> = detail.lines.iter().map(|line| line.line_order).collect();
        assert_eq!(orders, vec![1, 2]);
        assert!(detail.lines.iter().all(|line| line.status == LineStatus::Pending));
        assert_eq!(detail.history.len(), 1);
        assert_eq!(detail.history[0].action, HistoryAction::Request);
    }

    #[tokio::test]
    async fn second_submission_same_day_gets_next_sequence() {
        let fx = fixture().await;
        let first = fx.submit(vec![fx.a]).await;
        let second = fx.submit(vec![fx.b]).await;

        let first = fx.repo.find_detail(first).await.expect("detail").expect("exists");
        let second = fx.repo.find_detail(second).await.expect("detail").expect("exists");
        assert!(first.request.doc_number.ends_with("-0001"));
        assert!(second.request.doc_number.ends_with("-0002"));
    }

    #[tokio::test]
    async fn submit_for_missing_document_rolls_back() {
        let fx = fixture().await;
        let plan = plan_submission(SubmissionInput {
            document: DocumentRef::Contract(999),
            title: "Missing".to_string(),
            content: None,
            task_name: None,
            unty_file_no: None,
            requester_id: fx.requester,
            approvers: vec![fx.a],
        })
        .expect("plan");

        let error = fx.repo.submit(plan).await.expect_err("missing contract");
        assert!(matches!(error, RepositoryError::NotFound { entity: "contract", .. }));
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM approval_request")
            .fetch_one(&fx.pool)
            .await
            .expect("count");
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn approving_all_lines_finalizes_with_last_approver() {
        let fx = fixture().await;
        let id = fx.submit(vec![fx.a, fx.b]).await;

        let status = fx.repo.process(id, fx.a, Decision::Approve, "ok").await.expect("A approves");
        assert_eq!(status, ApprovalStatus::Pending);
        let detail = fx.repo.find_detail(id).await.expect("detail").expect("exists");
        assert_eq!(detail.lines[0].status, LineStatus::Approved);
        assert_eq!(detail.lines[1].status, LineStatus::Pending);

        let status = fx.repo.process(id, fx.b, Decision::Approve, "ok").await.expect("B approves");
        assert_eq!(status, ApprovalStatus::Approved);
        let detail = fx.repo.find_detail(id).await.expect("detail").expect("exists");
        assert_eq!(detail.request.final_approver_id, Some(fx.b));
        assert!(detail.request.final_approval_date.is_some());
        assert_eq!(fx.history_count(id).await, 3);
    }

    #[tokio::test]
    async fn rejection_cascades_and_blocks_further_actions() {
        let fx = fixture().await;
        let id = fx.submit(vec![fx.a, fx.b]).await;

        let status =
            fx.repo.process(id, fx.a, Decision::Reject, "wrong amount").await.expect("reject");
        assert_eq!(status, ApprovalStatus::Rejected);

        let detail = fx.repo.find_detail(id).await.expect("detail").expect("exists");
        assert_eq!(detail.lines[0].status, LineStatus::Rejected);
        assert_eq!(detail.lines[1].status, LineStatus::Rejected);
        assert_eq!(detail.lines[1].comment.as_deref(), Some(CASCADE_REJECT_COMMENT));
        assert_eq!(detail.latest_reject_comment.as_deref(), Some("wrong amount"));
        assert_eq!(detail.request.final_approver_id, Some(fx.a));

        let error = fx.repo.process(id, fx.b, Decision::Approve, "").await.expect_err("closed");
        assert_eq!(error.class(), ErrorClass::Conflict);
        assert_eq!(fx.history_count(id).await, 2);
    }

    #[tokio::test]
    async fn out_of_turn_approval_leaves_no_trace() {
        let fx = fixture().await;
        let id = fx.submit(vec![fx.a, fx.b]).await;

        let error = fx.repo.process(id, fx.b, Decision::Approve, "").await.expect_err("not yet");
        assert!(matches!(
            error,
            RepositoryError::Domain(DomainError::Workflow(WorkflowError::NoActiveLine { .. }))
        ));
        let detail = fx.repo.find_detail(id).await.expect("detail").expect("exists");
        assert!(detail.lines.iter().all(|line| line.status == LineStatus::Pending));
        assert_eq!(fx.history_count(id).await, 1);
    }

    #[tokio::test]
    async fn only_requester_can_cancel_and_only_once() {
        let fx = fixture().await;
        let id = fx.submit(vec![fx.a, fx.b]).await;

        let error = fx.repo.cancel(id, fx.a, "not mine").await.expect_err("stranger");
        assert_eq!(error.class(), ErrorClass::Forbidden);

        fx.repo.cancel(id, fx.requester, "withdrawn").await.expect("cancel");
        let detail = fx.repo.find_detail(id).await.expect("detail").expect("exists");
        assert_eq!(detail.request.status, ApprovalStatus::Cancelled);
        assert!(detail.lines.iter().all(|line| line.status == LineStatus::Cancelled));

        let error = fx.repo.cancel(id, fx.requester, "again").await.expect_err("already");
        assert_eq!(error.class(), ErrorClass::Conflict);
        assert_eq!(fx.history_count(id).await, 2);
    }

    #[tokio::test]
    async fn cancel_after_approval_is_refused() {
        let fx = fixture().await;
        let id = fx.submit(vec![fx.a]).await;
        fx.repo.process(id, fx.a, Decision::Approve, "").await.expect("approve");

        let error = fx.repo.cancel(id, fx.requester, "too late").await.expect_err("final");
        assert!(matches!(
            error,
            RepositoryError::Domain(DomainError::Workflow(WorkflowError::NotCancellable {
                status: ApprovalStatus::Approved
            }))
        ));
    }

    #[tokio::test]
    async fn status_update_records_history_except_for_requesting() {
        let fx = fixture().await;
        let id = fx.submit(vec![fx.a]).await;

        fx.repo
            .update_status(id, ApprovalStatus::Requesting, Some(fx.requester), "")
            .await
            .expect("requesting");
        assert_eq!(fx.history_count(id).await, 1);

        fx.repo
            .update_status(id, ApprovalStatus::Draft, Some(fx.requester), "back to draft")
            .await
            .expect("draft");
        let detail = fx.repo.find_detail(id).await.expect("detail").expect("exists");
        assert_eq!(detail.request.status, ApprovalStatus::Draft);
        assert_eq!(
            detail.history.last().map(|entry| entry.action),
            Some(HistoryAction::Status(ApprovalStatus::Draft))
        );
    }

    #[tokio::test]
    async fn requester_cannot_approve_through_status_update() {
        let fx = fixture().await;
        let id = fx.submit(vec![fx.a]).await;

        let error = fx
            .repo
            .update_status(id, ApprovalStatus::Approved, Some(fx.requester), "self approve")
            .await
            .expect_err("terminal status");
        assert!(matches!(
            error,
            RepositoryError::Domain(DomainError::Workflow(WorkflowError::TerminalStatusOverride {
                status: ApprovalStatus::Approved
            }))
        ));
        assert_eq!(error.class(), ErrorClass::BadRequest);

        let detail = fx.repo.find_detail(id).await.expect("detail").expect("exists");
        assert_eq!(detail.request.status, ApprovalStatus::Requesting);
        assert_eq!(detail.request.final_approver_id, None);
        assert_eq!(fx.history_count(id).await, 1);

        let status = fx.repo.process(id, fx.a, Decision::Approve, "ok").await.expect("A approves");
        assert_eq!(status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn status_update_on_closed_request_changes_nothing() {
        let fx = fixture().await;
        let approved = fx.submit(vec![fx.a]).await;
        fx.repo.process(approved, fx.a, Decision::Approve, "").await.expect("approve");
        let rejected = fx.submit(vec![fx.b]).await;
        fx.repo.process(rejected, fx.b, Decision::Reject, "no").await.expect("reject");

        let error = fx
            .repo
            .update_status(approved, ApprovalStatus::Cancelled, Some(fx.requester), "")
            .await
            .expect_err("approved is final");
        assert!(matches!(
            error,
            RepositoryError::Domain(DomainError::Workflow(WorkflowError::RequestClosed {
                status: ApprovalStatus::Approved
            }))
        ));
        let error = fx
            .repo
            .update_status(rejected, ApprovalStatus::Requesting, Some(fx.requester), "reopen")
            .await
            .expect_err("rejected is final");
        assert_eq!(error.class(), ErrorClass::Conflict);

        let detail = fx.repo.find_detail(approved).await.expect("detail").expect("exists");
        assert_eq!(detail.request.status, ApprovalStatus::Approved);
        assert!(detail.lines.iter().all(|line| line.status == LineStatus::Approved));
        assert_eq!(fx.history_count(approved).await, 2);
        let detail = fx.repo.find_detail(rejected).await.expect("detail").expect("exists");
        assert_eq!(detail.request.status, ApprovalStatus::Rejected);
    }

    #[tokio::test]
    async fn list_filters_by_approver_and_status_with_total() {
        let fx = fixture().await;
        let first = fx.submit(vec![fx.a]).await;
        fx.submit(vec![fx.b]).await;
        fx.submit(vec![fx.a, fx.b]).await;
        fx.repo.process(first, fx.a, Decision::Approve, "").await.expect("approve");

        let (items, total) = fx
            .repo
            .list(&ApprovalListFilter { approver_id: Some(fx.a), ..Default::default() }, Page::default())
            .await
            .expect("list");
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);

        let (approved, total) = fx
            .repo
            .list(
                &ApprovalListFilter { status: Some(ApprovalStatus::Approved), ..Default::default() },
                Page::default(),
            )
            .await
            .expect("list");
        assert_eq!(total, 1);
        assert_eq!(approved[0].id, first);

        let (page_two, total) = fx
            .repo
            .list(&ApprovalListFilter::default(), Page::new(Some(2), Some(2)))
            .await
            .expect("list");
        assert_eq!(total, 3);
        assert_eq!(page_two.len(), 1);
    }

    #[tokio::test]
    async fn contract_submission_links_contract_to_request() {
        let fx = fixture().await;
        let customer = insert_customer(&fx.pool, "Globex").await;
        let now = chrono::Utc::now().to_rfc3339();
        let contract_id = sqlx::query(
            "INSERT INTO contract (contract_no, contract_name, customer_id, created_at, updated_at)
             VALUES ('CTR-20240101-001', 'Support', ?, ?, ?)",
        )
        .bind(customer)
        .bind(&now)
        .bind(&now)
        .execute(&fx.pool)
        .await
        .expect("contract")
        .last_insert_rowid();

        let plan = plan_submission(SubmissionInput {
            document: DocumentRef::Contract(contract_id),
            title: "Contract review".to_string(),
            content: None,
            task_name: Some("CONTRACT".to_string()),
            unty_file_no: None,
            requester_id: fx.requester,
            approvers: vec![fx.a],
        })
        .expect("plan");
        let receipt = fx.repo.submit(plan).await.expect("submit");

        let linked: Option<i64> = sqlx::query_scalar("SELECT approval_id FROM contract WHERE id = ?")
            .bind(contract_id)
            .fetch_one(&fx.pool)
            .await
            .expect("linked");
        assert_eq!(linked, Some(receipt.approval_id.0));
    }
}
