//! End-to-end scenarios. Each wires a full [`lantern_node::LightNode`] to a
//! [`lantern_retrieval::test_utils::SimNetwork`] of scripted peers.

#[cfg(test)]
mod support;

#[cfg(test)]
mod batch_ordering;
#[cfg(test)]
mod coalescing;
#[cfg(test)]
mod indexer_restart;
#[cfg(test)]
mod peer_churn;
#[cfg(test)]
mod retry_budget;
#[cfg(test)]
mod timeouts;
