//! Product comparison and product questions.

use std::sync::Arc;

use petwise_core::{ChatTurn, ROLE_USER};
use petwise_model::MockLlm;
use petwise_rag::{
    Catalog, HashingEmbeddingProvider, IndexRecord, InMemoryVectorStore, Metadata, MetadataValue,
    PRODUCT_COLLECTION, ProductCard, VectorGateway, VectorStore,
};
use petwise_runner::{COMPETITOR_DOMAINS, HIGH_DEMAND_REPLY, ProductQa, SENTINEL_REPLY};

const DIMS: usize = 32;

fn card(id: &str, name: &str) -> ProductCard {
    ProductCard {
        product_id: id.into(),
        name: name.into(),
        brand: Some("Acme".into()),
        price: Some(39.99),
        autoship_price: Some(37.99),
        rating: Some(4.7),
        rating_count: Some(812.0),
        image: None,
        category: Some("Food".into()),
        score: 0.8,
        matches: Vec::new(),
    }
}

async fn qa(llm: Arc<MockLlm>) -> ProductQa {
    let embedder = HashingEmbeddingProvider::new(DIMS);
    let store = InMemoryVectorStore::new();
    store.create_collection(PRODUCT_COLLECTION, DIMS).await.unwrap();
    let synthesis = |id: &str, love: &str| {
        let mut metadata = Metadata::new();
        metadata.insert("what_customers_love".into(), MetadataValue::from(love));
        let document = format!("Review synthesis for {id}");
        IndexRecord { id: id.into(), embedding: embedder.embed_text(&document), document, metadata }
    };
    store
        .upsert(
            PRODUCT_COLLECTION,
            &[
                synthesis("11", "Dogs finish every bowl."),
                synthesis("11_2", "Resealable bag."),
                synthesis("110", "Belongs to another product."),
                synthesis("12", "Gentle on sensitive stomachs."),
            ],
        )
        .await
        .unwrap();
    let gateway = Arc::new(VectorGateway::new(Arc::new(store), Arc::new(embedder)));
    ProductQa::new(llm, gateway, Arc::new(Catalog::from_products(Vec::new())), "gpt-4.1-mini")
}

/// Comparisons never mention other retailers.
#[tokio::test]
async fn comparison_is_scrubbed_of_competitors() {
    let llm = Arc::new(MockLlm::new("mock").with_text(
        "Both are solid picks.\nYou can also find it on walmart.com.\nThe salmon recipe is gentler.\nCompare prices at https://www.amazon.com/dp/B00",
    ));
    let qa = qa(llm.clone()).await;
    let products = [card("11", "Chicken & Rice Puppy"), card("12", "Salmon & Pea Puppy")];
    let history = [ChatTurn::user("puppy food"), ChatTurn::assistant("Here are two options.")];

    let answer = qa.compare_products("compare these", &products, &history).await;
    assert!(!answer.is_empty());
    assert!(COMPETITOR_DOMAINS.iter().all(|domain| !answer.to_lowercase().contains(domain)));
    assert_eq!(answer, "Both are solid picks.\nThe salmon recipe is gentler.");

    let request = &llm.requests()[0];
    assert_eq!(request.contents.len(), 4);
    let prompt = request.contents.last().unwrap();
    assert_eq!(prompt.role, ROLE_USER);
    let prompt = prompt.text();
    assert!(prompt.contains("Product 1:\nTitle: Chicken & Rice Puppy"));
    assert!(prompt.contains("Dogs finish every bowl."));
    assert!(prompt.contains("Resealable bag."));
    assert!(!prompt.contains("Belongs to another product."));
    assert!(prompt.contains("Gentle on sensitive stomachs."));
}

#[tokio::test]
async fn rate_limit_reads_as_high_demand() {
    let qa = qa(Arc::new(MockLlm::new("mock").with_rate_limit())).await;
    let answer = qa.ask_about_product("is it grain free?", &card("12", "Salmon & Pea Puppy"), &[]).await;
    assert_eq!(answer, HIGH_DEMAND_REPLY);
}

#[tokio::test]
async fn answer_made_only_of_competitor_lines_falls_back() {
    let qa = qa(Arc::new(MockLlm::new("mock").with_text("Check petco.com for this."))).await;
    let answer = qa.ask_about_product("where else?", &card("11", "Chicken & Rice Puppy"), &[]).await;
    assert_eq!(answer, SENTINEL_REPLY);
}
