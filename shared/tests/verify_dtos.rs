use shared::queue_times::{PARKS, ParkWaitsResponse, QUEUE_TIMES_BASE_URL, park_waits_url};

#[tokio::test]
async fn verify_park_waits_dtos() -> Result<(), reqwest::Error> {
    let url = park_waits_url(QUEUE_TIMES_BASE_URL, PARKS[1].api_id);
    let res = reqwest::get(url).await?.json::<ParkWaitsResponse>().await?;
    let lands = res.lands.expect("live payload should contain lands");
    assert!(!lands.is_empty());
    Ok(())
}
