pub mod skinned_data;
