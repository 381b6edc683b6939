mod lifecycle_steps;
mod matching_steps;
mod negotiation_steps;
