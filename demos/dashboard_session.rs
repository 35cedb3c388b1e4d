use std::sync::Arc;
use std::time::Duration;
use strading_session::{
    ClientConfig, MemoryCookieJar, OutgoingMessage, SessionClient, WatchNavigator,
};

/// Log in against a running dashboard backend and watch realtime traffic
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strading_session=debug".into()),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let email = std::env::var("STRADING_DEMO_EMAIL").unwrap_or_else(|_| "demo@strading.com".into());
    let password = std::env::var("STRADING_DEMO_PASSWORD").unwrap_or_else(|_| "demo123".into());

    println!("📡 API: {}\n", config.api_url);

    let navigator = Arc::new(WatchNavigator::new());
    let mut routes = navigator.subscribe();
    tokio::spawn(async move {
        while routes.changed().await.is_ok() {
            if let Some(route) = routes.borrow_and_update().clone() {
                println!("🧭 Navigated to {}", route);
            }
        }
    });

    let client = SessionClient::new(config, Arc::new(MemoryCookieJar::new()), navigator)?;

    let session = client.login(&email, &password).await?;
    if let Some(user) = &session.user {
        println!("✅ Logged in as {} ({})\n", user.full_name(), user.email);
    }

    let _notifications = client.notifications().on_notification(|payload| {
        println!("🔔 Notification: {}", payload);
    });
    let _messages = client.messages().on_new_message(|payload| {
        println!("💬 New message: {}", payload);
    });
    let _errors = client.messages().on_message_error(|payload| {
        println!("⚠️  Message error: {}", payload);
    });

    if let Ok(conversation) = std::env::var("STRADING_DEMO_CONVERSATION") {
        client.messages().join_conversation(&conversation).await?;
        let outcome = client
            .messages()
            .send_message(&OutgoingMessage::to_conversation(&conversation, "Hello from Rust"))
            .await?;
        println!("📤 Sent to {}: {:?}", conversation, outcome);
    }

    let mut notification_count = client.notification_counter().watch();
    let mut message_count = client.message_counter().watch();

    println!("⏳ Watching unread counts for 60 seconds...\n");
    let deadline = tokio::time::sleep(Duration::from_secs(60));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Ok(()) = notification_count.changed() => {
                println!("🔔 Unread notifications: {}", *notification_count.borrow_and_update());
            }
            Ok(()) = message_count.changed() => {
                println!("💬 Unread messages: {}", *message_count.borrow_and_update());
            }
        }
    }

    client.logout().await?;
    println!("\n👋 Logged out");
    Ok(())
}
