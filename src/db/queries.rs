//! Database queries against the Django schema.
//!
//! Every function takes a connection so callers can run them inside one
//! transaction.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;

use crate::audit::models::{ActionKind, AuditStatistics, NewAuditEntry};
use crate::error::{AppError, Result};

use super::rows::{AccountRow, AuditRow, ContentTypeRow, QuoteRequestRow};

const AUDIT_COLUMNS: &str = r#"
    l.id,
    l.timestamp,
    l.usuario_id::BIGINT AS usuario_id,
    l.sessao_id,
    host(l.ip_address) AS ip_address,
    l.user_agent,
    l.acao,
    l.descricao,
    ct.model,
    l.object_id::BIGINT AS object_id,
    l.dados_anteriores,
    l.dados_posteriores,
    l.campos_alterados,
    l.modulo,
    l.funcionalidade,
    l.sucesso,
    l.erro_mensagem
"#;

const REQUEST_COLUMNS: &str = r#"
    id::BIGINT AS id,
    numero,
    uuid,
    cliente_id::BIGINT AS cliente_id,
    projeto_id::BIGINT AS projeto_id,
    nome_solicitante,
    email_solicitante,
    telefone_solicitante,
    endereco,
    cidade,
    cep,
    tipo_servico,
    descricao_servico,
    area_aproximada,
    urgencia,
    data_inicio_desejada,
    orcamento_maximo,
    observacoes,
    status,
    created_at,
    updated_at
"#;

// ==================== content types ====================

/// Get a content type by app_label and model name
pub async fn get_content_type(conn: &mut PgConnection, app_label: &str, model: &str) -> Result<ContentTypeRow> {
    sqlx::query_as::<_, ContentTypeRow>(
        r#"
        SELECT id, app_label, model
        FROM django_content_type
        WHERE app_label = $1 AND model = $2
        "#,
    )
    .bind(app_label)
    .bind(model)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("content type {}.{}", app_label, model)))
}

// ==================== audit log ====================

/// Insert an audit entry and return its id
pub async fn insert_audit_entry(conn: &mut PgConnection, content_type_id: i32, entry: &NewAuditEntry) -> Result<i64> {
    let changes = entry.changes.as_ref().map(serde_json::to_value).transpose()?;

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO orcamentos_logauditoria (
            "timestamp", usuario_id, sessao_id, ip_address, user_agent,
            acao, descricao, content_type_id, object_id,
            dados_anteriores, dados_posteriores, campos_alterados,
            modulo, funcionalidade, sucesso, erro_mensagem
        )
        VALUES ($1, $2, $3, $4::inet, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING id
        "#,
    )
    .bind(entry.timestamp)
    .bind(entry.actor_id)
    .bind(&entry.session_id)
    .bind(entry.ip_address.as_deref())
    .bind(&entry.user_agent)
    .bind(entry.action.as_str())
    .bind(&entry.description)
    .bind(content_type_id)
    .bind(entry.entity.id)
    .bind(&entry.before)
    .bind(&entry.after)
    .bind(changes)
    .bind(&entry.module)
    .bind(&entry.feature)
    .bind(entry.success)
    .bind(&entry.error_message)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Audit rows about one object, newest first
pub async fn get_entries_for_object(
    conn: &mut PgConnection,
    content_type_id: i32,
    object_id: i64,
    limit: i64,
) -> Result<Vec<AuditRow>> {
    let sql = format!(
        r#"
        SELECT {AUDIT_COLUMNS}
        FROM orcamentos_logauditoria l
        JOIN django_content_type ct ON ct.id = l.content_type_id
        WHERE l.content_type_id = $1 AND l.object_id = $2
        ORDER BY l.timestamp DESC, l.id DESC
        LIMIT $3
        "#
    );
    let rows = sqlx::query_as::<_, AuditRow>(&sql)
        .bind(content_type_id)
        .bind(object_id)
        .bind(limit)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

/// Audit rows recorded by one user since a point in time, newest first
pub async fn get_entries_for_user(
    conn: &mut PgConnection,
    user_id: i64,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<AuditRow>> {
    let sql = format!(
        r#"
        SELECT {AUDIT_COLUMNS}
        FROM orcamentos_logauditoria l
        JOIN django_content_type ct ON ct.id = l.content_type_id
        WHERE l.usuario_id = $1 AND l.timestamp >= $2
        ORDER BY l.timestamp DESC, l.id DESC
        LIMIT $3
        "#
    );
    let rows = sqlx::query_as::<_, AuditRow>(&sql)
        .bind(user_id)
        .bind(since)
        .bind(limit)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

/// Aggregate audit counts over `[since, until]`
pub async fn get_audit_statistics(
    conn: &mut PgConnection,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<AuditStatistics> {
    let mut stats = AuditStatistics::default();

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM orcamentos_logauditoria
        WHERE "timestamp" BETWEEN $1 AND $2
        "#,
    )
    .bind(since)
    .bind(until)
    .fetch_one(&mut *conn)
    .await?;
    stats.total = total as u64;

    let by_action = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT acao, COUNT(*)
        FROM orcamentos_logauditoria
        WHERE "timestamp" BETWEEN $1 AND $2
        GROUP BY acao
        "#,
    )
    .bind(since)
    .bind(until)
    .fetch_all(&mut *conn)
    .await?;
    for (code, count) in by_action {
        match ActionKind::from_code(&code) {
            Some(kind) => {
                stats.by_kind.insert(kind, count as u64);
            }
            None => tracing::warn!(acao = %code, "Unknown action in audit statistics"),
        }
    }

    let by_actor = sqlx::query_as::<_, (Option<i64>, i64)>(
        r#"
        SELECT usuario_id::BIGINT, COUNT(*)
        FROM orcamentos_logauditoria
        WHERE "timestamp" BETWEEN $1 AND $2
        GROUP BY usuario_id
        "#,
    )
    .bind(since)
    .bind(until)
    .fetch_all(&mut *conn)
    .await?;
    stats.by_actor = crate::audit::models::top_actors(by_actor.into_iter().map(|(id, n)| (id, n as u64)));

    let by_module = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT modulo, COUNT(*)
        FROM orcamentos_logauditoria
        WHERE "timestamp" BETWEEN $1 AND $2
        GROUP BY modulo
        "#,
    )
    .bind(since)
    .bind(until)
    .fetch_all(&mut *conn)
    .await?;
    stats.by_module = by_module.into_iter().map(|(m, n)| (m, n as u64)).collect();

    let by_day = sqlx::query_as::<_, (NaiveDate, i64)>(
        r#"
        SELECT ("timestamp" AT TIME ZONE 'UTC')::date AS day, COUNT(*)
        FROM orcamentos_logauditoria
        WHERE "timestamp" BETWEEN $1 AND $2
        GROUP BY day
        "#,
    )
    .bind(since)
    .bind(until)
    .fetch_all(conn)
    .await?;
    stats.by_day = by_day.into_iter().map(|(d, n)| (d, n as u64)).collect();

    Ok(stats)
}

// ==================== quote requests ====================

/// Orphan requests whose email matches, oldest first
pub async fn get_orphan_requests_by_email(conn: &mut PgConnection, email: &str) -> Result<Vec<QuoteRequestRow>> {
    let sql = format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM orcamentos_solicitacaoorcamento
        WHERE cliente_id IS NULL
          AND LOWER(TRIM(email_solicitante)) = LOWER(TRIM($1))
        ORDER BY created_at, id
        "#
    );
    let rows = sqlx::query_as::<_, QuoteRequestRow>(&sql)
        .bind(email)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

/// Every orphan request, oldest first
pub async fn get_orphan_requests(conn: &mut PgConnection) -> Result<Vec<QuoteRequestRow>> {
    let sql = format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM orcamentos_solicitacaoorcamento
        WHERE cliente_id IS NULL
        ORDER BY created_at, id
        "#
    );
    let rows = sqlx::query_as::<_, QuoteRequestRow>(&sql).fetch_all(conn).await?;

    Ok(rows)
}

/// Attach still-orphan requests to a user, returning the ids actually updated
pub async fn link_requests_to_user(conn: &mut PgConnection, request_ids: &[i64], user_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE orcamentos_solicitacaoorcamento
        SET cliente_id = $2, updated_at = NOW()
        WHERE id = ANY($1) AND cliente_id IS NULL
        RETURNING id::BIGINT
        "#,
    )
    .bind(request_ids)
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    Ok(ids)
}

/// Requests linked to a user that were submitted with the given email
pub async fn count_linked_requests(conn: &mut PgConnection, user_id: i64, email: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM orcamentos_solicitacaoorcamento
        WHERE cliente_id = $1
          AND LOWER(TRIM(email_solicitante)) = LOWER(TRIM($2))
        "#,
    )
    .bind(user_id)
    .bind(email)
    .fetch_one(conn)
    .await?;

    Ok(count)
}

// ==================== accounts ====================

/// Oldest user whose email matches, ignoring case and surrounding whitespace
pub async fn get_user_by_email(conn: &mut PgConnection, email: &str) -> Result<Option<AccountRow>> {
    let row = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT id::BIGINT AS id, username, first_name, last_name, email, is_staff
        FROM auth_user
        WHERE LOWER(TRIM(email)) = LOWER(TRIM($1))
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(email)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Oldest staff user
pub async fn get_first_staff_user(conn: &mut PgConnection) -> Result<Option<AccountRow>> {
    let row = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT id::BIGINT AS id, username, first_name, last_name, email, is_staff
        FROM auth_user
        WHERE is_staff
        ORDER BY id
        LIMIT 1
        "#,
    )
    .fetch_optional(conn)
    .await?;

    Ok(row)
}
