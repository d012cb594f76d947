fn main() {
    tactics::cli::bin::cli()
}
