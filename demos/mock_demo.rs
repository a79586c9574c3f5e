use std::sync::Arc;

use network_service::logging::init_logging;
use network_service::{MockConfig, MockNetworkService, RestMethod, StaticFixtureSource};

#[derive(Debug, serde::Deserialize)]
struct Profile {
    id: u64,
    name: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Point `fixture_dir` at a directory of `<identifier>.json` files to replay recorded responses instead
    let fixtures = StaticFixtureSource::new().with_fixture(
        "service.get.profile.response",
        r#"{"id": 1, "name": "Ada Lovelace"}"#,
    );
    let mock = MockNetworkService::new(&MockConfig::from_values(true, 250.0), Arc::new(fixtures));

    let profile: Profile = mock
        .mock_call(RestMethod::Get, "profile", None, Some("Loading profile"))
        .await?;
    println!("loaded profile {} ({})", profile.name, profile.id);

    mock.set_enable_success_mock(false);
    match mock
        .mock_call::<Profile>(RestMethod::Get, "profile", None, None)
        .await
    {
        Ok(profile) => println!("unexpected success: {profile:?}"),
        Err(err) => println!("simulated failure: {err}"),
    }
    Ok(())
}
