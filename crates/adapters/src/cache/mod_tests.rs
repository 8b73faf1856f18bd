use super::*;

#[tokio::test]
async fn fake_cache_satisfies_the_cache_trait() {
    async fn roundtrip<C: Cache>(cache: &C) {
        cache.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }
    roundtrip(&FakeCache::new()).await;
}
