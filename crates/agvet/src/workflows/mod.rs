pub mod telemedicine;
