use crate::errors::ApiError;
use crate::models::{Patrimony, Transfer, User, UserRole};

/// Operações de workflow sujeitas a verificação de papel/afiliação.
///
/// Concentrar as regras aqui evita que cada handler repita comparações de
/// papel com regras ligeiramente diferentes.
pub enum WorkflowAction<'a> {
    /// Solicitar transferência: administrador, gestor, ou o responsável
    /// atual pelo patrimônio.
    RequestTransfer { patrimony: &'a Patrimony },
    /// Aprovar/rejeitar transferência: administrador, ou gestor cujo setor
    /// seja a origem ou o destino da transferência.
    DecideTransfer { transfer: &'a Transfer },
    /// Efetivar transferência aprovada: administrador ou gestor.
    EffectuateTransfer,
    /// Aprovar/rejeitar baixa: somente administrador.
    DecideWriteOff,
}

pub fn authorize(user: &User, action: &WorkflowAction) -> Result<(), ApiError> {
    let allowed = match action {
        WorkflowAction::RequestTransfer { patrimony } => match user.role {
            UserRole::Admin | UserRole::Manager => true,
            UserRole::User => patrimony.responsible_id == Some(user.id),
        },
        WorkflowAction::DecideTransfer { transfer } => match user.role {
            UserRole::Admin => true,
            UserRole::Manager => {
                user.sector_id.is_some()
                    && (user.sector_id == transfer.origin_sector_id
                        || user.sector_id == transfer.destination_sector_id)
            }
            UserRole::User => false,
        },
        WorkflowAction::EffectuateTransfer => {
            matches!(user.role, UserRole::Admin | UserRole::Manager)
        }
        WorkflowAction::DecideWriteOff => matches!(user.role, UserRole::Admin),
    };

    if allowed {
        Ok(())
    } else {
        Err(ApiError::permission(
            "Usuário não tem permissão para esta operação",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn user_with(role: UserRole, sector_id: Option<Uuid>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "teste".to_string(),
            email: None,
            role,
            sector_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn patrimony_with(responsible_id: Option<Uuid>) -> Patrimony {
        Patrimony {
            id: Uuid::new_v4(),
            plate: "ADM001".to_string(),
            name: "Computador".to_string(),
            description: None,
            category_id: None,
            sector_id: Some(Uuid::new_v4()),
            responsible_id,
            acquisition_date: None,
            value: 2500.0,
            status: AssetStatus::Active,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn transfer_between(origin: Uuid, destination: Uuid) -> Transfer {
        Transfer {
            id: Uuid::new_v4(),
            patrimony_id: Uuid::new_v4(),
            origin_sector_id: Some(origin),
            destination_sector_id: Some(destination),
            origin_responsible_id: None,
            destination_responsible_id: None,
            requested_by: None,
            reason: None,
            approved_by: None,
            approval_date: None,
            approval_notes: None,
            rejection_reason: None,
            effectuated: false,
            effectuation_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn responsible_user_may_request_transfer() {
        let user = user_with(UserRole::User, None);
        let mut patrimony = patrimony_with(Some(user.id));
        assert!(authorize(&user, &WorkflowAction::RequestTransfer { patrimony: &patrimony }).is_ok());

        patrimony.responsible_id = Some(Uuid::new_v4());
        assert!(
            authorize(&user, &WorkflowAction::RequestTransfer { patrimony: &patrimony }).is_err()
        );
    }

    #[test]
    fn admin_and_manager_may_always_request() {
        let patrimony = patrimony_with(None);
        for role in [UserRole::Admin, UserRole::Manager] {
            let user = user_with(role, None);
            assert!(
                authorize(&user, &WorkflowAction::RequestTransfer { patrimony: &patrimony })
                    .is_ok()
            );
        }
    }

    #[test]
    fn manager_decides_only_within_own_sectors() {
        let origin = Uuid::new_v4();
        let destination = Uuid::new_v4();
        let transfer = transfer_between(origin, destination);

        let origin_manager = user_with(UserRole::Manager, Some(origin));
        let destination_manager = user_with(UserRole::Manager, Some(destination));
        let outside_manager = user_with(UserRole::Manager, Some(Uuid::new_v4()));
        let no_sector_manager = user_with(UserRole::Manager, None);

        let action = WorkflowAction::DecideTransfer { transfer: &transfer };
        assert!(authorize(&origin_manager, &action).is_ok());
        assert!(authorize(&destination_manager, &action).is_ok());
        assert!(authorize(&outside_manager, &action).is_err());
        assert!(authorize(&no_sector_manager, &action).is_err());
    }

    #[test]
    fn plain_user_never_decides() {
        let transfer = transfer_between(Uuid::new_v4(), Uuid::new_v4());
        let user = user_with(UserRole::User, transfer.origin_sector_id);
        assert!(authorize(&user, &WorkflowAction::DecideTransfer { transfer: &transfer }).is_err());
        assert!(authorize(&user, &WorkflowAction::EffectuateTransfer).is_err());
    }

    #[test]
    fn write_off_decision_is_admin_only() {
        assert!(authorize(
            &user_with(UserRole::Admin, None),
            &WorkflowAction::DecideWriteOff
        )
        .is_ok());
        assert!(authorize(
            &user_with(UserRole::Manager, Some(Uuid::new_v4())),
            &WorkflowAction::DecideWriteOff
        )
        .is_err());
        assert!(authorize(
            &user_with(UserRole::User, None),
            &WorkflowAction::DecideWriteOff
        )
        .is_err());
    }
}
