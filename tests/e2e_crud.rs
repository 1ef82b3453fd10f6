//! End-to-end tests for the full AccountService over gRPC
use modelrpc_e2e_tests::{list_accounts, seed_accounts, usernames, TestServer};
use modelrpc_engine::demo::messages::{
    Account, AccountListRequest, AccountLookupRequest, AccountPartialUpdateRequest,
};
use modelrpc_engine::demo::AccountService;
use tonic::Code;

fn lookup(id: i64) -> AccountLookupRequest {
    AccountLookupRequest {
        id,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_e2e_create_then_retrieve() {
    let server = TestServer::start::<AccountService>(vec![], vec![]).await;
    let mut client = server.client().await;

    let created = client
        .create(Account {
            username: Some("margaret".into()),
            email: Some("margaret@example.com".into()),
            groups: vec!["apollo".into()],
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(created.id, 1);
    assert_eq!(created.is_active, Some(true));
    assert_eq!(created.groups, vec!["apollo".to_string()]);

    let fetched = client.retrieve(lookup(created.id)).await.unwrap().into_inner();
    assert_eq!(fetched, created);
    assert_eq!(server.store().len(), 1);
}

#[tokio::test]
async fn test_e2e_create_ignores_client_supplied_id() {
    let server = TestServer::start::<AccountService>(seed_accounts(), vec![]).await;
    let mut client = server.client().await;

    let created = client
        .create(Account {
            id: 1,
            username: Some("barbara".into()),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(created.id, 4);
}

#[tokio::test]
async fn test_e2e_invalid_create_is_rejected() {
    let server = TestServer::start::<AccountService>(vec![], vec![]).await;
    let mut client = server.client().await;

    let status = client
        .create(Account {
            email: Some("not-an-email".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("username"));
    assert!(status.message().contains("email"));
    assert!(server.store().is_empty());
}

#[tokio::test]
async fn test_e2e_duplicate_username() {
    let server = TestServer::start::<AccountService>(seed_accounts(), vec![]).await;
    let mut client = server.client().await;

    let status = client
        .create(Account {
            username: Some("grace".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::AlreadyExists);
}

#[tokio::test]
async fn test_e2e_list_streams_in_order_with_filters() {
    let server = TestServer::start::<AccountService>(seed_accounts(), vec![]).await;
    let mut client = server.client().await;

    let all = list_accounts(&mut client, AccountListRequest::default()).await;
    assert_eq!(usernames(&all), ["ada", "grace", "linus"]);

    let filtered = list_accounts(
        &mut client,
        AccountListRequest {
            username: Some("A".into()),
            ordering: Some("-id".into()),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(usernames(&filtered), ["grace", "ada"]);
}

#[tokio::test]
async fn test_e2e_list_empty_store() {
    let server = TestServer::start::<AccountService>(vec![], vec![]).await;
    let mut client = server.client().await;

    assert!(list_accounts(&mut client, AccountListRequest::default())
        .await
        .is_empty());
}

#[tokio::test]
async fn test_e2e_update_keeps_unsent_fields() {
    let server = TestServer::start::<AccountService>(seed_accounts(), vec![]).await;
    let mut client = server.client().await;

    let updated = client
        .update(Account {
            id: 1,
            is_active: Some(false),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(updated.username.as_deref(), Some("ada"));
    assert_eq!(updated.email.as_deref(), Some("ada@example.com"));
    assert_eq!(updated.is_active, Some(false));
}

#[tokio::test]
async fn test_e2e_partial_update_with_field_list() {
    let server = TestServer::start::<AccountService>(seed_accounts(), vec![]).await;
    let mut client = server.client().await;

    let updated = client
        .partial_update(AccountPartialUpdateRequest {
            id: 1,
            username: Some("ignored".into()),
            partial_update_fields: vec!["email".into()],
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();

    // Listed but unset: cleared. Unlisted: untouched.
    assert_eq!(updated.username.as_deref(), Some("ada"));
    assert_eq!(updated.email, None);
}

#[tokio::test]
async fn test_e2e_destroy_then_not_found() {
    let server = TestServer::start::<AccountService>(seed_accounts(), vec![]).await;
    let mut client = server.client().await;

    client.destroy(lookup(2)).await.unwrap();

    let status = client.retrieve(lookup(2)).await.unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "Account: 2 not found!");

    let remaining = list_accounts(&mut client, AccountListRequest::default()).await;
    assert_eq!(usernames(&remaining), ["ada", "linus"]);
}
