//! A hub-driven traffic light: publishing `Fire` events on a [`Hub`]
//! advances a [`StateMachine`] built from a diagram string.
//!
//! Run with:
//!   cargo run --example traffic_light -p edt --features full

use std::sync::Arc;

use edt::prelude::*;

#[tokio::main]
async fn main() {
    let hub = Arc::new(Hub::new());
    let fsm = Arc::new(
        StateMachine::from_diagram(
            "[*] --> Red\n\
             Red --> Green\n\
             Green --> Yellow\n\
             Yellow --> Red\n",
        )
        .expect("diagram parses")
        .with_events(["GoToGreen", "GoToYellow", "GoToRed"])
        .on_enter(
            "Green",
            edt::edt_core::action_fn(|token| async move {
                let trigger = token.get::<Trigger>().expect("hooks carry a Trigger");
                println!("go! ({} -> {})", trigger.from.unwrap_or_default(), trigger.to);
                Ok(ActionResult::nothing())
            }),
        )
        .build()
        .expect("diagram declares an initial state"),
    );
    fsm.bind_hub(&hub);
    fsm.start().await.expect("first start succeeds");
    println!("-> {}", fsm.current().unwrap());

    for event in ["GoToGreen", "GoToYellow", "GoToRed"] {
        let mut set = hub
            .publish(Fire(event.to_string()), Token::background())
            .await;
        while set.join_next().await.is_some() {}
        println!("-> {}", fsm.current().unwrap());
    }
}
