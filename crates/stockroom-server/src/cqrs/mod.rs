//! Command/query registry
//!
//! Every import command and query implements [`mediator::Request`] and is
//! registered here against its `handle` function, bound to the shared
//! [`FeatureState`].

pub use mediator::DefaultAsyncMediator;

use crate::features::FeatureState;

pub mod middleware;

pub type AppMediator = DefaultAsyncMediator;

pub fn build_mediator(state: FeatureState) -> AppMediator {
    DefaultAsyncMediator::builder()
        // Imports: commands
        .add_handler({
            let state = state.clone();
            move |cmd| {
                let state = state.clone();
                async move { crate::features::imports::commands::upload::handle(&state, cmd).await }
            }
        })
        .add_handler({
            let state = state.clone();
            move |cmd| {
                let state = state.clone();
                async move { crate::features::imports::commands::cancel::handle(&state, cmd).await }
            }
        })
        .add_handler({
            let state = state.clone();
            move |cmd| {
                let state = state.clone();
                async move { crate::features::imports::commands::delete::handle(&state, cmd).await }
            }
        })
        // Imports: queries
        .add_handler({
            let state = state.clone();
            move |query| {
                let state = state.clone();
                async move { crate::features::imports::queries::list_jobs::handle(&state, query).await }
            }
        })
        .add_handler({
            let state = state.clone();
            move |query| {
                let state = state.clone();
                async move { crate::features::imports::queries::get_job::handle(&state, query).await }
            }
        })
        .add_handler({
            let state = state.clone();
            move |query| {
                let state = state.clone();
                async move { crate::features::imports::queries::get_errors::handle(&state, query).await }
            }
        })
        .build()
}
