//! Account model service

use super::messages;
use super::models::Account;
use super::serializer::AccountSerializer;
use crate::context::{Call, CallContext, Request};
use crate::error::{Error, Result};
use crate::generics::GenericService;
use crate::mixins::{
    CreateModelMixin, DestroyModelMixin, ListModelMixin, PartialUpdateModelMixin,
    RetrieveModelMixin, UpdateModelMixin,
};
use crate::services::{actions, assign_value, Attributes, Routes, Service};
use crate::store::{BaseQuerySet, Lookup, QuerySet};
use serde_json::Value;

/// Attributes every [`AccountService`] instance is built with
#[derive(Debug, Clone, Default)]
pub struct AccountAttributes {
    pub queryset: Option<BaseQuerySet<Account>>,
    pub lookup_field: Option<String>,
    pub lookup_request_field: Option<String>,
    /// Ordering applied to List when the request names none
    pub ordering: Option<String>,
}

impl AccountAttributes {
    pub fn new(queryset: BaseQuerySet<Account>) -> Self {
        Self {
            queryset: Some(queryset),
            ..Default::default()
        }
    }
}

impl Attributes for AccountAttributes {
    const DECLARED: &'static [&'static str] = &["lookup_field", "lookup_request_field", "ordering"];

    fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        match name {
            "lookup_field" => assign_value(&mut self.lookup_field, name, value),
            "lookup_request_field" => assign_value(&mut self.lookup_request_field, name, value),
            "ordering" => assign_value(&mut self.ordering, name, value),
            other => Err(Error::configuration(format!(
                "AccountAttributes has no attribute {other:?}"
            ))),
        }
    }
}

pub struct AccountService {
    attributes: AccountAttributes,
    call: Call,
}

impl Service for AccountService {
    const NAME: &'static str = "AccountService";

    type Attributes = AccountAttributes;
    type Message = messages::Account;

    fn new(attributes: &AccountAttributes, call: Call) -> Self {
        Self {
            attributes: attributes.clone(),
            call,
        }
    }

    fn call(&self) -> &Call {
        &self.call
    }

    fn routes() -> Routes<Self> {
        Routes::new().model()
    }
}

impl GenericService for AccountService {
    type Model = Account;
    type Serializer = AccountSerializer;

    fn queryset(&self) -> Option<&BaseQuerySet<Account>> {
        self.attributes.queryset.as_ref()
    }

    fn lookup_field(&self) -> &str {
        self.attributes.lookup_field.as_deref().unwrap_or("id")
    }

    fn lookup_request_field(&self) -> &str {
        self.attributes
            .lookup_request_field
            .as_deref()
            .unwrap_or_else(|| self.lookup_field())
    }

    fn filter_queryset(
        &self,
        request: &Request,
        _context: &CallContext,
        queryset: QuerySet<Account>,
    ) -> Result<QuerySet<Account>> {
        if self.call.action != actions::LIST {
            return Ok(queryset);
        }

        let mut queryset = queryset;
        if let Some(username) = request.get("username").and_then(Value::as_str) {
            queryset = queryset.filter(Lookup::icontains("username", username));
        }
        if let Some(active) = request.get("is_active").and_then(Value::as_bool) {
            queryset = queryset.filter(Lookup::exact("is_active", active));
        }

        let ordering = request
            .get("ordering")
            .and_then(Value::as_str)
            .or(self.attributes.ordering.as_deref())
            .unwrap_or("id");
        for key in ordering.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            queryset = queryset.order_by(key);
        }
        Ok(queryset)
    }
}

impl CreateModelMixin for AccountService {}
impl ListModelMixin for AccountService {}
impl RetrieveModelMixin for AccountService {}
impl UpdateModelMixin for AccountService {}
impl PartialUpdateModelMixin for AccountService {}
impl DestroyModelMixin for AccountService {}

/// Account service exposing List and Retrieve only
pub struct ReadOnlyAccountService(AccountService);

impl Service for ReadOnlyAccountService {
    const NAME: &'static str = "ReadOnlyAccountService";

    type Attributes = AccountAttributes;
    type Message = messages::Account;

    fn new(attributes: &AccountAttributes, call: Call) -> Self {
        Self(AccountService::new(attributes, call))
    }

    fn call(&self) -> &Call {
        self.0.call()
    }

    fn routes() -> Routes<Self> {
        Routes::new().read_only()
    }
}

impl GenericService for ReadOnlyAccountService {
    type Model = Account;
    type Serializer = AccountSerializer;

    fn queryset(&self) -> Option<&BaseQuerySet<Account>> {
        self.0.queryset()
    }

    fn lookup_field(&self) -> &str {
        self.0.lookup_field()
    }

    fn lookup_request_field(&self) -> &str {
        self.0.lookup_request_field()
    }

    fn filter_queryset(
        &self,
        request: &Request,
        context: &CallContext,
        queryset: QuerySet<Account>,
    ) -> Result<QuerySet<Account>> {
        self.0.filter_queryset(request, context, queryset)
    }
}

impl ListModelMixin for ReadOnlyAccountService {}
impl RetrieveModelMixin for ReadOnlyAccountService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Dispatcher;
    use crate::store::InMemoryStore;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_stream::StreamExt;

    fn accounts() -> BaseQuerySet<Account> {
        let store = InMemoryStore::new().with_unique("username");
        store.seed(vec![
            Account::new(1, "ada").with_email("ada@example.com"),
            Account::new(2, "grace"),
            Account {
                is_active: false,
                ..Account::new(3, "adele")
            },
        ])
        .unwrap();
        BaseQuerySet::new(Arc::new(store))
    }

    fn request(value: Value) -> Request {
        Request::new(value.as_object().cloned().unwrap_or_default())
    }

    async fn list(dispatcher: &Dispatcher<AccountService>, filters: Value) -> Vec<String> {
        dispatcher
            .handler(actions::LIST)
            .call(request(filters), CallContext::default())
            .await
            .unwrap()
            .into_stream()
            .unwrap()
            .map(|account| account.unwrap().username.unwrap_or_default())
            .collect::<Vec<_>>()
            .await
    }

    #[tokio::test]
    async fn test_list_filters_and_ordering() {
        let dispatcher = Dispatcher::<AccountService>::new(AccountAttributes::new(accounts()));

        assert_eq!(list(&dispatcher, json!({})).await, ["ada", "grace", "adele"]);
        assert_eq!(list(&dispatcher, json!({"username": "AD"})).await, ["ada", "adele"]);
        assert_eq!(list(&dispatcher, json!({"is_active": false})).await, ["adele"]);
        assert_eq!(
            list(&dispatcher, json!({"ordering": "-username"})).await,
            ["grace", "adele", "ada"]
        );
    }

    #[tokio::test]
    async fn test_bound_ordering_is_the_default() {
        let dispatcher = Dispatcher::<AccountService>::bind(
            AccountAttributes::new(accounts()),
            [("ordering", json!("username"))],
        )
        .unwrap();
        assert_eq!(list(&dispatcher, json!({})).await, ["ada", "adele", "grace"]);
    }

    #[tokio::test]
    async fn test_lookup_by_username() {
        let dispatcher = Dispatcher::<AccountService>::bind(
            AccountAttributes::new(accounts()),
            [("lookup_field", json!("username"))],
        )
        .unwrap();

        let account = dispatcher
            .handler(actions::RETRIEVE)
            .call(request(json!({"username": "grace"})), CallContext::default())
            .await
            .unwrap()
            .into_message()
            .unwrap();
        assert_eq!(account.id, 2);
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let dispatcher = Dispatcher::<AccountService>::new(AccountAttributes::new(accounts()));
        let err = dispatcher
            .handler(actions::CREATE)
            .call(request(json!({"username": "ada"})), CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::AlreadyExists);
    }

    #[tokio::test]
    async fn test_read_only_service_rejects_writes() {
        let dispatcher =
            Dispatcher::<ReadOnlyAccountService>::new(AccountAttributes::new(accounts()));
        assert!(dispatcher.implements(actions::LIST));
        assert!(dispatcher.implements(actions::RETRIEVE));

        for action in [actions::CREATE, actions::UPDATE, actions::PARTIAL_UPDATE, actions::DESTROY] {
            let context = CallContext::default();
            let err = dispatcher
                .handler(action)
                .call(request(json!({"id": 1})), context.clone())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::NotImplemented), "{action}");
            assert_eq!(context.code(), Some(tonic::Code::Unimplemented));
        }
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        let err = Dispatcher::<AccountService>::bind(
            AccountAttributes::new(accounts()),
            [("queryset", json!(null))],
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("AccountService() received an invalid attribute \"queryset\""));
        assert!(message.contains("Bindable attributes are: [lookup_field, lookup_request_field, ordering]"));
    }
}
