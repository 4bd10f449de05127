//! Row types read from the Django schema and their conversion into domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::FromRow;
use tracing::warn;
use uuid::Uuid;

use crate::audit::models::{ActionKind, AuditLogEntry};
use crate::audit::snapshot::{EntityKind, EntityRef};
use crate::models::{Actor, QuoteRequest, QuoteStatus, ServiceType, Urgency};

/// ContentType from django_content_type (for GenericFK resolution)
#[derive(Debug, Clone, FromRow)]
pub struct ContentTypeRow {
    pub id: i32,
    pub app_label: String,
    pub model: String,
}

/// One row of orcamentos_logauditoria joined with its content type
#[derive(Debug, Clone, FromRow)]
pub struct AuditRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub usuario_id: Option<i64>,
    pub sessao_id: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub acao: String,
    pub descricao: String,
    pub model: String,
    pub object_id: i64,
    pub dados_anteriores: Option<Value>,
    pub dados_posteriores: Option<Value>,
    pub campos_alterados: Option<Value>,
    pub modulo: String,
    pub funcionalidade: String,
    pub sucesso: bool,
    pub erro_mensagem: String,
}

impl AuditRow {
    /// Convert to an entry; rows written by other code paths with codes this
    /// crate does not know are skipped.
    pub fn into_entry(self) -> Option<AuditLogEntry> {
        let Some(action) = ActionKind::from_code(&self.acao) else {
            warn!(id = self.id, acao = %self.acao, "Skipping audit row with unknown action");
            return None;
        };
        let Some(kind) = EntityKind::from_code(&self.model) else {
            warn!(id = self.id, model = %self.model, "Skipping audit row about an untracked model");
            return None;
        };

        let changes = match self.campos_alterados {
            Some(value) => match serde_json::from_value(value) {
                Ok(changes) => Some(changes),
                Err(e) => {
                    warn!(id = self.id, error = %e, "Unreadable changed fields on audit row");
                    None
                }
            },
            None => None,
        };

        Some(AuditLogEntry {
            id: self.id,
            timestamp: self.timestamp,
            actor_id: self.usuario_id,
            session_id: self.sessao_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            action,
            description: self.descricao,
            entity: EntityRef::new(kind, self.object_id),
            before: self.dados_anteriores,
            after: self.dados_posteriores,
            changes,
            module: self.modulo,
            feature: self.funcionalidade,
            success: self.sucesso,
            error_message: self.erro_mensagem,
        })
    }
}

/// Row of orcamentos_solicitacaoorcamento
#[derive(Debug, Clone, FromRow)]
pub struct QuoteRequestRow {
    pub id: i64,
    pub numero: String,
    pub uuid: Uuid,
    pub cliente_id: Option<i64>,
    pub projeto_id: Option<i64>,
    pub nome_solicitante: String,
    pub email_solicitante: String,
    pub telefone_solicitante: String,
    pub endereco: String,
    pub cidade: String,
    pub cep: String,
    pub tipo_servico: String,
    pub descricao_servico: String,
    pub area_aproximada: Option<Decimal>,
    pub urgencia: String,
    pub data_inicio_desejada: Option<NaiveDate>,
    pub orcamento_maximo: Option<Decimal>,
    pub observacoes: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QuoteRequestRow> for QuoteRequest {
    fn from(row: QuoteRequestRow) -> Self {
        let service_type = ServiceType::from_code(&row.tipo_servico).unwrap_or_else(|| {
            warn!(id = row.id, code = %row.tipo_servico, "Unknown service type, using 'outro'");
            ServiceType::Other
        });
        let urgency = Urgency::from_code(&row.urgencia).unwrap_or_else(|| {
            warn!(id = row.id, code = %row.urgencia, "Unknown urgency, using 'media'");
            Urgency::Normal
        });
        let status = QuoteStatus::from_code(&row.status).unwrap_or_else(|| {
            warn!(id = row.id, code = %row.status, "Unknown request status, using 'pendente'");
            QuoteStatus::Draft
        });

        QuoteRequest {
            id: row.id,
            number: row.numero,
            uuid: row.uuid,
            client_id: row.cliente_id,
            project_id: row.projeto_id,
            requester_name: row.nome_solicitante,
            requester_email: row.email_solicitante,
            requester_phone: row.telefone_solicitante,
            address: row.endereco,
            city: row.cidade,
            postal_code: row.cep,
            service_type,
            service_description: row.descricao_servico,
            approx_area: row.area_aproximada,
            urgency,
            desired_start: row.data_inicio_desejada,
            max_budget: row.orcamento_maximo,
            notes: row.observacoes,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Row of auth_user
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
}

impl From<AccountRow> for Actor {
    fn from(row: AccountRow) -> Self {
        let full_name = format!("{} {}", row.first_name.trim(), row.last_name.trim());
        let display_name = match full_name.trim() {
            "" => row.username,
            name => name.to_string(),
        };
        Actor {
            id: row.id,
            display_name,
            email: row.email,
            is_staff: row.is_staff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn audit_row(acao: &str, model: &str) -> AuditRow {
        AuditRow {
            id: 7,
            timestamp: Utc.with_ymd_and_hms(2025, 5, 2, 8, 30, 0).unwrap(),
            usuario_id: Some(3),
            sessao_id: String::new(),
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: String::new(),
            acao: acao.to_string(),
            descricao: "Orçamento editado".to_string(),
            model: model.to_string(),
            object_id: 12,
            dados_anteriores: None,
            dados_posteriores: None,
            campos_alterados: Some(json!({"title": {"anterior": "A", "novo": "B"}})),
            modulo: "orcamentos".to_string(),
            funcionalidade: String::new(),
            sucesso: true,
            erro_mensagem: String::new(),
        }
    }

    #[test]
    fn test_audit_row_into_entry() {
        let entry = audit_row("edicao", "orcamento").into_entry().unwrap();
        assert_eq!(entry.action, ActionKind::Edit);
        assert_eq!(entry.entity, EntityRef::new(EntityKind::Quote, 12));
        let changes = entry.changes.unwrap();
        assert_eq!(changes["title"].before.as_deref(), Some("A"));
        assert_eq!(changes["title"].after.as_deref(), Some("B"));
    }

    #[test]
    fn test_audit_row_with_unknown_codes_is_skipped() {
        assert!(audit_row("arquivamento", "orcamento").into_entry().is_none());
        assert!(audit_row("edicao", "permission").into_entry().is_none());
    }

    #[test]
    fn test_account_display_name_falls_back_to_username() {
        let row = AccountRow {
            id: 1,
            username: "mlopes".to_string(),
            first_name: " ".to_string(),
            last_name: String::new(),
            email: "m@example.com".to_string(),
            is_staff: true,
        };
        assert_eq!(Actor::from(row).display_name, "mlopes");

        let named = AccountRow {
            id: 2,
            username: "jd".to_string(),
            first_name: "Jean".to_string(),
            last_name: "Dupont".to_string(),
            email: "jd@example.com".to_string(),
            is_staff: false,
        };
        assert_eq!(Actor::from(named).display_name, "Jean Dupont");
    }
}
