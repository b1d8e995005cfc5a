//! Demo that renders a few canned reviews through both default formatters
//! and prints the payloads (no network, no state).

use review_radar::{
    AppMetadata, AppStoreMessage, PlayStoreMessage, RenderMessage, ResolvedApp, Review,
    SourceParams,
};

fn main() {
    let app_store_app = ResolvedApp {
        id: "123456".into(),
        params: SourceParams::AppStore {
            regions: vec!["us".into()],
            page_range: 1,
        },
        show_app_icon: true,
        icon_override: None,
        verbose: false,
        renderer: None,
    };
    let play_store_app = ResolvedApp {
        id: "com.example.demo".into(),
        params: SourceParams::PlayStore {
            publisher_key: "publisher.json".into(),
        },
        show_app_icon: true,
        icon_override: None,
        verbose: false,
        renderer: None,
    };

    let meta = AppMetadata {
        name: "Demo App".into(),
        icon: "https://cdn.example/demo-icon.png".into(),
        link: "https://store.example/demo".into(),
    };

    let app_store_review = Review {
        id: "as-1".into(),
        rating: 5,
        title: "Fantastic".into(),
        text: "Exactly what I needed.".into(),
        author: "Kim".into(),
        link: "https://store.example/users/kim".into(),
        version: "3.2.0".into(),
        version_code: None,
        device: None,
        os_version: None,
        region: Some("us".into()),
    };
    let play_store_review = Review {
        id: "ps-1".into(),
        rating: 2,
        title: String::new(),
        text: "Crashes after the last update.".into(),
        author: "Alex".into(),
        link: "https://play.example/store/apps/details?id=com.example.demo&reviewId=ps-1".into(),
        version: "3.2.0".into(),
        version_code: Some(320),
        device: Some("Pixel 8".into()),
        os_version: Some(34),
        region: None,
    };

    let samples = [
        ("app-store", AppStoreMessage.render(&app_store_review, &meta, &app_store_app)),
        ("play-store", PlayStoreMessage.render(&play_store_review, &meta, &play_store_app)),
    ];

    for (label, payload) in samples {
        println!("--- {label} ---");
        println!("{}", serde_json::to_string_pretty(&payload).expect("payload serializes"));
    }

    println!("render-demo done");
}
