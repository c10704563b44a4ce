//! In-memory authorization transaction storage.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;
use veridian_oidc::error::OidcError;
use veridian_oidc::oauth::transaction::AuthorizationTransaction;
use veridian_oidc::storage::TransactionStorage;

use crate::{TenantKey, tenant_key};

/// Authorization transactions held in a concurrent map, with a secondary
/// index from authorization code to transaction identifier.
///
/// Single-use codes are enforced through the index: removing the code entry
/// is atomic, so exactly one exchange wins even under concurrent polls.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStorage {
    transactions: DashMap<(String, Uuid), AuthorizationTransaction>,
    codes: DashMap<TenantKey, Uuid>,
}

impl InMemoryTransactionStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn index_code(&self, transaction: &AuthorizationTransaction) {
        if let Some(code) = &transaction.authorization_code
            && !transaction.code_consumed
        {
            self.codes
                .insert(tenant_key(&transaction.tenant_id, code), transaction.id);
        }
    }
}

#[async_trait]
impl TransactionStorage for InMemoryTransactionStorage {
    async fn create(&self, transaction: &AuthorizationTransaction) -> Result<(), OidcError> {
        self.transactions.insert(
            (transaction.tenant_id.clone(), transaction.id),
            transaction.clone(),
        );
        self.index_code(transaction);
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &str,
        id: Uuid,
    ) -> Result<Option<AuthorizationTransaction>, OidcError> {
        Ok(self
            .transactions
            .get(&(tenant_id.to_string(), id))
            .map(|entry| entry.value().clone()))
    }

    async fn update(&self, transaction: &AuthorizationTransaction) -> Result<(), OidcError> {
        self.transactions.insert(
            (transaction.tenant_id.clone(), transaction.id),
            transaction.clone(),
        );
        self.index_code(transaction);
        Ok(())
    }

    async fn consume_code(
        &self,
        tenant_id: &str,
        code: &str,
    ) -> Result<Option<AuthorizationTransaction>, OidcError> {
        // Removing the index entry is the single atomic step; losers of a
        // concurrent exchange observe None here.
        let Some((_, id)) = self.codes.remove(&tenant_key(tenant_id, code)) else {
            return Ok(None);
        };
        let Some(mut entry) = self.transactions.get_mut(&(tenant_id.to_string(), id)) else {
            return Ok(None);
        };
        if entry.code_consumed || entry.authorization_code.as_deref() != Some(code) {
            return Ok(None);
        }
        entry.code_consumed = true;
        Ok(Some(entry.value().clone()))
    }

    async fn delete_expired(&self, tenant_id: &str) -> Result<u64, OidcError> {
        let before = self.transactions.len();
        self.transactions
            .retain(|(tenant, _), txn| tenant != tenant_id || !txn.is_expired());
        self.codes.retain(|(tenant, _), id| {
            tenant != tenant_id || self.transactions.contains_key(&(tenant.clone(), *id))
        });
        Ok((before - self.transactions.len()) as u64)
    }
}
