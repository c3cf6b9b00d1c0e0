pub mod conjugate;
