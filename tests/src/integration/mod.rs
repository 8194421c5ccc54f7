mod s1_registration;
mod s2_target_then_convergence;
mod s3_revert;
mod s4_unauthorized_mutation;
mod s5_cancellation_race;
mod s6_repository_conflict;
