mod common;

use common::{Cartoon, RecordingBackend, cartoons, seeded};
use mongo_models::{bson::doc, prelude::*};

#[tokio::test]
async fn single_page_holds_everything() {
    let connection = seeded().await;

    let page = connection
        .model::<Cartoon>()
        .paged_find(PageRequest::new(doc! {}).with_limit(10).with_page(1))
        .await
        .unwrap();

    assert_eq!(page.data.len(), 3);
    assert_eq!(page.pages, Pages {
        current: 1,
        prev: 0,
        has_prev: false,
        next: 2,
        has_next: false,
        total: 1,
    });
    assert_eq!(page.items, Items {
        limit: 10,
        begin: 1,
        end: 3,
        total: 3,
    });
}

#[tokio::test]
async fn pages_walk_in_sort_order() {
    let connection = seeded().await;
    let collection = connection.model::<Cartoon>();
    let request = PageRequest::new(doc! {})
        .with_fields("name group count")
        .with_sort("-count")
        .with_limit(2);

    let first = collection.paged_find(request.clone()).await.unwrap();
    let second = collection.paged_find(request.with_page(2)).await.unwrap();

    assert_eq!(
        first.data.iter().map(|cartoon| cartoon.name.as_str()).collect::<Vec<_>>(),
        vec!["Yak", "Ren"]
    );
    assert!(first.pages.has_next);
    assert!(!first.pages.has_prev);
    assert_eq!(first.pages.total, 2);
    assert_eq!((first.items.begin, first.items.end), (1, 2));

    assert_eq!(second.data.len(), 1);
    assert_eq!(second.data[0].name, "Stimpy");
    assert!(!second.pages.has_next);
    assert!(second.pages.has_prev);
    assert_eq!((second.items.begin, second.items.end, second.items.total), (3, 3, 3));
}

#[tokio::test]
async fn zero_matches() {
    let connection = seeded().await;

    let page = connection
        .model::<Cartoon>()
        .paged_find(PageRequest::new(doc! { "group": "Nobody" }).with_limit(10))
        .await
        .unwrap();

    assert!(page.data.is_empty());
    assert_eq!(page.pages.total, 0);
    assert!(!page.pages.has_next);
    assert_eq!((page.items.begin, page.items.end, page.items.total), (0, 0, 0));
}

#[tokio::test]
async fn serializes_with_camel_case_flags() {
    let connection = seeded().await;

    let page = connection
        .model::<Cartoon>()
        .paged_find(PageRequest::new(doc! { "name": "Yak" }).with_fields("-_id"))
        .await
        .unwrap();

    let json = serde_json::to_value(&page).unwrap();

    assert_eq!(json["data"][0]["name"], "Yak");
    assert_eq!(json["pages"]["hasPrev"], false);
    assert_eq!(json["pages"]["hasNext"], false);
    assert_eq!(json["items"]["limit"], 20);
}

#[tokio::test]
async fn non_positive_limit_is_rejected_locally() {
    let backend = RecordingBackend::new();
    let connection = Connection::new(backend.clone());

    let result = connection
        .model::<Cartoon>()
        .paged_find(PageRequest::new(doc! {}).with_limit(0))
        .await;

    assert!(matches!(result, Err(ModelError::InvalidArgument(_))));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn either_failure_fails_the_page() {
    for failing in ["count", "find"] {
        let backend = RecordingBackend::new().failing(failing);
        let connection = Connection::new(backend.clone());
        connection
            .model::<Cartoon>()
            .insert_many(cartoons())
            .await
            .unwrap();

        let result = connection
            .model::<Cartoon>()
            .paged_find(PageRequest::new(doc! {}))
            .await;

        match result {
            Err(ModelError::Backend(source)) => {
                assert_eq!(source.to_string(), format!("{failing} failed"));
            }
            other => panic!("expected {failing} to fail the page, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn documents_that_do_not_fit_the_model_fail() {
    let connection = seeded().await;
    connection
        .model::<Cartoon>()
        .insert_one(doc! { "name": "Powdered Toast Man", "count": "lots" })
        .await
        .unwrap();

    let result = connection
        .model::<Cartoon>()
        .paged_find(PageRequest::new(doc! { "count": "lots" }))
        .await;

    assert!(matches!(result, Err(ModelError::Serialization(_))));
}

#[tokio::test]
async fn concurrent_pages_share_one_collection() {
    let connection = seeded().await;
    let collection = connection.model::<Cartoon>();
    let request = PageRequest::new(doc! {}).with_sort("name").with_limit(2);

    let (first, second) = futures::try_join!(
        collection.paged_find(request.clone()),
        collection.paged_find(request.clone().with_page(2)),
    )
    .unwrap();

    assert_eq!(
        first.data.iter().map(|cartoon| cartoon.name.as_str()).collect::<Vec<_>>(),
        vec!["Ren", "Stimpy"]
    );
    assert_eq!(second.data[0].name, "Yak");
    assert_eq!(first.items.total, second.items.total);
}

#[tokio::test]
async fn out_of_range_pages_do_not_overflow() {
    let connection = seeded().await;
    let collection = connection.model::<Cartoon>();

    let last = collection
        .paged_find(PageRequest::new(doc! {}).with_limit(10).with_page(i64::MAX))
        .await
        .unwrap();
    assert!(last.data.is_empty());
    assert_eq!(last.pages.next, i64::MAX);
    assert!(!last.pages.has_next);

    let first = collection
        .paged_find(PageRequest::new(doc! {}).with_limit(10).with_page(i64::MIN))
        .await
        .unwrap();
    assert_eq!(first.data.len(), 3);
    assert_eq!(first.pages.prev, i64::MIN);
}
