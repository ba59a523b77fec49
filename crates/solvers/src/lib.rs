//! The fault dispute game core used by the fault-challenger: the claim tree, the chess clock, a
//! local model of the game contract, trace providers and the response solver.

pub mod fault;
