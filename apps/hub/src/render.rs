//! Plain-text rendering of the hub state.

use client_core::{
    content::{
        format_time_range, INFO_CARDS, REFLECTION_LINKS, REFLECTION_PROMPT, REFLECTION_STEPS,
        REFLECTION_TITLE,
    },
    ErrorClass, HubError, Readiness, ViewController,
};
use shared::domain::View;

pub fn header(controller: &ViewController) {
    let header = controller.header();
    let user = header
        .user_id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".into());
    println!(
        "Conference Hub · {} · {} · {}",
        header.deployment_scope,
        user,
        header.role.as_str()
    );
    let tabs: Vec<_> = controller
        .visible_tabs()
        .into_iter()
        .map(|view| {
            if view == controller.state().view {
                format!("[{}]", view.label())
            } else {
                view.label().to_string()
            }
        })
        .collect();
    println!("{}", tabs.join("  "));
    for banner in controller.state().banners() {
        println!("! {banner}");
    }
}

pub fn error(err: &HubError) {
    match err.class() {
        ErrorClass::Bootstrap => eprintln!("!! {err}"),
        ErrorClass::Subscription => eprintln!("! {err}"),
        ErrorClass::Mutation | ErrorClass::Validation => eprintln!("error: {err}"),
    }
}

pub fn schedule(controller: &ViewController) {
    match controller.readiness() {
        Readiness::Initializing => {
            println!("Initializing…");
            return;
        }
        Readiness::LoadingSchedule => {
            println!("Loading schedule…");
            return;
        }
        Readiness::Ready => {}
    }

    let state = controller.state();
    if state.sessions.is_empty() {
        println!("No sessions yet.");
        return;
    }
    for session in &state.sessions {
        let mark = if state.is_attending(&session.id) { "x" } else { " " };
        println!(
            "[{mark}] {:<10} {}  {}",
            session.id.as_str(),
            format_time_range(&session.start_iso, &session.end_iso),
            session.title
        );
        println!("    {} · {}", session.room, session.speaker);
        println!("    {}", session.summary);
    }
}

pub fn reflection() {
    println!("{REFLECTION_TITLE}");
    println!("{REFLECTION_PROMPT}");
    for (index, step) in REFLECTION_STEPS.iter().enumerate() {
        println!("  {}. {step}", index + 1);
    }
    for link in &REFLECTION_LINKS {
        println!("  {} <{}>", link.label, link.url);
    }
}

pub fn info() {
    for card in &INFO_CARDS {
        println!("{}", card.title);
        println!("  {}", card.body);
    }
}

pub fn current_view(controller: &ViewController) {
    match controller.state().view {
        View::Schedule | View::Admin => schedule(controller),
        View::Reflection => reflection(),
        View::Info => info(),
    }
}
